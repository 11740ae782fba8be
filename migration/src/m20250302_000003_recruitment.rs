use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum JobPostings {
    Table,
    Id,
    OrgId,
    Title,
    Description,
    Requirements,
    DepartmentId,
    Location,
    EmploymentType,
    SalaryMinCents,
    SalaryMaxCents,
    Currency,
    IsRemote,
    Urgency,
    Status,
    Deadline,
    MaxApplications,
    PostedAt,
    ClosedAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Candidates {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Phone,
    Location,
    Summary,
    Skills,
    ExperienceYears,
    LinkedinUrl,
    PortfolioUrl,
    ResumePath,
    ResumeOriginalName,
    ProfileComplete,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CandidateApplications {
    Table,
    Id,
    OrgId,
    CandidateId,
    JobPostingId,
    CoverLetter,
    ExpectedSalaryCents,
    Availability,
    AdditionalNotes,
    Status,
    AppliedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Uploads {
    Table,
    Id,
    OrgId,
    OwnerId,
    Category,
    Folder,
    StoredName,
    OriginalName,
    MimeType,
    SizeBytes,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobPostings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(JobPostings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(JobPostings::OrgId).uuid().not_null())
                    .col(ColumnDef::new(JobPostings::Title).string_len(200).not_null())
                    .col(ColumnDef::new(JobPostings::Description).text().not_null())
                    .col(ColumnDef::new(JobPostings::Requirements).text())
                    .col(ColumnDef::new(JobPostings::DepartmentId).uuid())
                    .col(ColumnDef::new(JobPostings::Location).string_len(100))
                    .col(ColumnDef::new(JobPostings::EmploymentType).string_len(16).not_null())
                    .col(ColumnDef::new(JobPostings::SalaryMinCents).big_integer())
                    .col(ColumnDef::new(JobPostings::SalaryMaxCents).big_integer())
                    .col(ColumnDef::new(JobPostings::Currency).string_len(3).not_null())
                    .col(
                        ColumnDef::new(JobPostings::IsRemote)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(JobPostings::Urgency).string_len(16).not_null())
                    .col(ColumnDef::new(JobPostings::Status).string_len(16).not_null())
                    .col(ColumnDef::new(JobPostings::Deadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(JobPostings::MaxApplications).integer())
                    .col(ColumnDef::new(JobPostings::PostedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(JobPostings::ClosedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(JobPostings::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(JobPostings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(JobPostings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_job_postings_org_status")
                    .table(JobPostings::Table)
                    .col(JobPostings::OrgId)
                    .col(JobPostings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Candidates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Candidates::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Candidates::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Candidates::PasswordHash).string_len(256).not_null())
                    .col(ColumnDef::new(Candidates::FirstName).string_len(50).not_null())
                    .col(ColumnDef::new(Candidates::LastName).string_len(50).not_null())
                    .col(ColumnDef::new(Candidates::Phone).string_len(20))
                    .col(ColumnDef::new(Candidates::Location).string_len(100))
                    .col(ColumnDef::new(Candidates::Summary).text())
                    .col(ColumnDef::new(Candidates::Skills).json().not_null())
                    .col(ColumnDef::new(Candidates::ExperienceYears).integer())
                    .col(ColumnDef::new(Candidates::LinkedinUrl).string_len(512))
                    .col(ColumnDef::new(Candidates::PortfolioUrl).string_len(512))
                    .col(ColumnDef::new(Candidates::ResumePath).string_len(512))
                    .col(ColumnDef::new(Candidates::ResumeOriginalName).string_len(255))
                    .col(
                        ColumnDef::new(Candidates::ProfileComplete)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Candidates::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Candidates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Candidates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CandidateApplications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CandidateApplications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CandidateApplications::OrgId).uuid().not_null())
                    .col(ColumnDef::new(CandidateApplications::CandidateId).uuid().not_null())
                    .col(ColumnDef::new(CandidateApplications::JobPostingId).uuid().not_null())
                    .col(ColumnDef::new(CandidateApplications::CoverLetter).text())
                    .col(ColumnDef::new(CandidateApplications::ExpectedSalaryCents).big_integer())
                    .col(ColumnDef::new(CandidateApplications::Availability).string_len(100))
                    .col(ColumnDef::new(CandidateApplications::AdditionalNotes).string_len(500))
                    .col(
                        ColumnDef::new(CandidateApplications::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CandidateApplications::AppliedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CandidateApplications::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_candidate")
                            .from(CandidateApplications::Table, CandidateApplications::CandidateId)
                            .to(Candidates::Table, Candidates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_job")
                            .from(
                                CandidateApplications::Table,
                                CandidateApplications::JobPostingId,
                            )
                            .to(JobPostings::Table, JobPostings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_applications_candidate_job")
                    .table(CandidateApplications::Table)
                    .col(CandidateApplications::CandidateId)
                    .col(CandidateApplications::JobPostingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Uploads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Uploads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Uploads::OrgId).uuid())
                    .col(ColumnDef::new(Uploads::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Uploads::Category).string_len(16).not_null())
                    .col(ColumnDef::new(Uploads::Folder).string_len(32).not_null())
                    .col(ColumnDef::new(Uploads::StoredName).string_len(255).not_null())
                    .col(ColumnDef::new(Uploads::OriginalName).string_len(255).not_null())
                    .col(ColumnDef::new(Uploads::MimeType).string_len(128).not_null())
                    .col(ColumnDef::new(Uploads::SizeBytes).big_integer().not_null())
                    .col(
                        ColumnDef::new(Uploads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_uploads_owner")
                    .table(Uploads::Table)
                    .col(Uploads::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Uploads::Table.into_iden(),
            CandidateApplications::Table.into_iden(),
            Candidates::Table.into_iden(),
            JobPostings::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
