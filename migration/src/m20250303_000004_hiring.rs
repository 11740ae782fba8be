use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Interviews {
    Table,
    Id,
    OrgId,
    ApplicationId,
    CandidateId,
    JobPostingId,
    ScheduledBy,
    ScheduledAt,
    DurationMinutes,
    InterviewType,
    Location,
    MeetingLink,
    Interviewers,
    Notes,
    Feedback,
    Status,
    CancellationReason,
    CancelledAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OnboardingTasks {
    Table,
    Id,
    OrgId,
    EmployeeId,
    CandidateId,
    ApplicationId,
    Title,
    Position,
    DueDate,
    Status,
    Notes,
    CompletedAt,
    CompletedBy,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ReportHistory {
    Table,
    Id,
    OrgId,
    ReportType,
    StartDate,
    EndDate,
    Summary,
    GeneratedBy,
    GeneratedAt,
}

#[derive(DeriveIden)]
enum CandidateApplications {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
}

fn timestamp(column: impl IntoIden) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Interviews::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Interviews::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Interviews::OrgId).uuid().not_null())
                    .col(ColumnDef::new(Interviews::ApplicationId).uuid().not_null())
                    .col(ColumnDef::new(Interviews::CandidateId).uuid().not_null())
                    .col(ColumnDef::new(Interviews::JobPostingId).uuid().not_null())
                    .col(ColumnDef::new(Interviews::ScheduledBy).uuid().not_null())
                    .col(&mut timestamp(Interviews::ScheduledAt))
                    .col(
                        ColumnDef::new(Interviews::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(ColumnDef::new(Interviews::InterviewType).string_len(16).not_null())
                    .col(ColumnDef::new(Interviews::Location).string_len(200))
                    .col(ColumnDef::new(Interviews::MeetingLink).string_len(500))
                    .col(ColumnDef::new(Interviews::Interviewers).json().not_null())
                    .col(ColumnDef::new(Interviews::Notes).text())
                    .col(ColumnDef::new(Interviews::Feedback).text())
                    .col(ColumnDef::new(Interviews::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Interviews::CancellationReason).string_len(500))
                    .col(ColumnDef::new(Interviews::CancelledAt).timestamp_with_time_zone())
                    .col(&mut timestamp(Interviews::CreatedAt))
                    .col(&mut timestamp(Interviews::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interviews_application")
                            .from(Interviews::Table, Interviews::ApplicationId)
                            .to(CandidateApplications::Table, CandidateApplications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_interviews_org_scheduled")
                    .table(Interviews::Table)
                    .col(Interviews::OrgId)
                    .col(Interviews::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OnboardingTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OnboardingTasks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OnboardingTasks::OrgId).uuid().not_null())
                    .col(ColumnDef::new(OnboardingTasks::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(OnboardingTasks::CandidateId).uuid().not_null())
                    .col(ColumnDef::new(OnboardingTasks::ApplicationId).uuid().not_null())
                    .col(ColumnDef::new(OnboardingTasks::Title).string_len(200).not_null())
                    .col(ColumnDef::new(OnboardingTasks::Position).integer().not_null())
                    .col(ColumnDef::new(OnboardingTasks::DueDate).date().not_null())
                    .col(ColumnDef::new(OnboardingTasks::Status).string_len(16).not_null())
                    .col(ColumnDef::new(OnboardingTasks::Notes).string_len(1000))
                    .col(ColumnDef::new(OnboardingTasks::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OnboardingTasks::CompletedBy).uuid())
                    .col(ColumnDef::new(OnboardingTasks::CreatedBy).uuid().not_null())
                    .col(&mut timestamp(OnboardingTasks::CreatedAt))
                    .col(&mut timestamp(OnboardingTasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_onboarding_employee")
                            .from(OnboardingTasks::Table, OnboardingTasks::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReportHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ReportHistory::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ReportHistory::OrgId).uuid().not_null())
                    .col(ColumnDef::new(ReportHistory::ReportType).string_len(16).not_null())
                    .col(ColumnDef::new(ReportHistory::StartDate).date().not_null())
                    .col(ColumnDef::new(ReportHistory::EndDate).date().not_null())
                    .col(ColumnDef::new(ReportHistory::Summary).json().not_null())
                    .col(ColumnDef::new(ReportHistory::GeneratedBy).uuid().not_null())
                    .col(&mut timestamp(ReportHistory::GeneratedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_report_history_org_generated")
                    .table(ReportHistory::Table)
                    .col(ReportHistory::OrgId)
                    .col(ReportHistory::GeneratedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            ReportHistory::Table.into_iden(),
            OnboardingTasks::Table.into_iden(),
            Interviews::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
