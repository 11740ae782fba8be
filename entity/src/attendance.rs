use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub org_id: Uuid,
    #[sea_orm(indexed)]
    pub employee_id: Uuid,
    pub date: Date,
    pub clock_in: Option<DateTimeWithTimeZone>,
    pub clock_out: Option<DateTimeWithTimeZone>,
    pub break_minutes: i32,
    pub hours_worked: f64,
    pub overtime_hours: f64,
    pub status: Status,
    pub work_from_home: bool,
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employees::Entity",
        from = "Column::EmployeeId",
        to = "super::employees::Column::Id",
        on_delete = "Cascade"
    )]
    Employee,
}

impl Related<super::employees::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "PRESENT")]
    Present,
    #[sea_orm(string_value = "ABSENT")]
    Absent,
    #[sea_orm(string_value = "LATE")]
    Late,
    #[sea_orm(string_value = "HALF_DAY")]
    HalfDay,
    #[sea_orm(string_value = "VACATION")]
    Vacation,
    #[sea_orm(string_value = "SICK")]
    Sick,
    #[sea_orm(string_value = "PERSONAL")]
    Personal,
}

impl ActiveModelBehavior for ActiveModel {}
