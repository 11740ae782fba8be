use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "report_history")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub org_id: Uuid,
    pub report_type: ReportType,
    pub start_date: Date,
    pub end_date: Date,
    pub summary: Json,
    pub generated_by: Uuid,
    pub generated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[sea_orm(string_value = "attendance")]
    Attendance,
    #[sea_orm(string_value = "payroll")]
    Payroll,
    #[sea_orm(string_value = "leave")]
    Leave,
    #[sea_orm(string_value = "performance")]
    Performance,
    #[sea_orm(string_value = "recruitment")]
    Recruitment,
    #[sea_orm(string_value = "employee")]
    Employee,
}

impl ActiveModelBehavior for ActiveModel {}
