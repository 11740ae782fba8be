use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "candidate_applications")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub org_id: Uuid,
    #[sea_orm(indexed)]
    pub candidate_id: Uuid,
    #[sea_orm(indexed)]
    pub job_posting_id: Uuid,
    #[sea_orm(column_type = "Text", nullable)]
    pub cover_letter: Option<String>,
    pub expected_salary_cents: Option<i64>,
    pub availability: Option<String>,
    pub additional_notes: Option<String>,
    pub status: Status,
    pub applied_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::candidates::Entity",
        from = "Column::CandidateId",
        to = "super::candidates::Column::Id",
        on_delete = "Cascade"
    )]
    Candidate,
    #[sea_orm(
        belongs_to = "super::job_postings::Entity",
        from = "Column::JobPostingId",
        to = "super::job_postings::Column::Id",
        on_delete = "Cascade"
    )]
    JobPosting,
}

impl Related<super::candidates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Candidate.def()
    }
}

impl Related<super::job_postings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobPosting.def()
    }
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "APPLIED")]
    Applied,
    #[sea_orm(string_value = "SCREENING")]
    Screening,
    #[sea_orm(string_value = "INTERVIEW")]
    Interview,
    #[sea_orm(string_value = "OFFERED")]
    Offered,
    #[sea_orm(string_value = "HIRED")]
    Hired,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "WITHDRAWN")]
    Withdrawn,
}

impl ActiveModelBehavior for ActiveModel {}
