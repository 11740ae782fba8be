use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "interviews")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub org_id: Uuid,
    #[sea_orm(indexed)]
    pub application_id: Uuid,
    pub candidate_id: Uuid,
    #[sea_orm(indexed)]
    pub job_posting_id: Uuid,
    /// User id of whoever booked the slot.
    pub scheduled_by: Uuid,
    pub scheduled_at: DateTimeWithTimeZone,
    pub duration_minutes: i32,
    pub interview_type: InterviewType,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    /// User ids sitting on the panel.
    pub interviewers: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub feedback: Option<String>,
    pub status: Status,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::candidate_applications::Entity",
        from = "Column::ApplicationId",
        to = "super::candidate_applications::Column::Id",
        on_delete = "Cascade"
    )]
    Application,
}

impl Related<super::candidate_applications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewType {
    #[sea_orm(string_value = "PHONE")]
    Phone,
    #[sea_orm(string_value = "VIDEO")]
    Video,
    #[sea_orm(string_value = "IN_PERSON")]
    InPerson,
    #[sea_orm(string_value = "PANEL")]
    Panel,
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "NO_SHOW")]
    NoShow,
}

impl Status {
    /// Finished interviews cannot be moved or reopened.
    pub fn is_closed(self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled | Status::NoShow)
    }
}

impl ActiveModelBehavior for ActiveModel {}
