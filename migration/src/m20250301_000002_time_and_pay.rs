use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum AttendanceRecords {
    Table,
    Id,
    OrgId,
    EmployeeId,
    Date,
    ClockIn,
    ClockOut,
    BreakMinutes,
    HoursWorked,
    OvertimeHours,
    Status,
    WorkFromHome,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LeaveRequests {
    Table,
    Id,
    OrgId,
    EmployeeId,
    LeaveType,
    StartDate,
    EndDate,
    DaysRequested,
    Reason,
    Status,
    ApproverId,
    IsEmergency,
    WorkCoverage,
    ApprovedAt,
    RejectedAt,
    RejectionReason,
    CancelledAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PayrollRecords {
    Table,
    Id,
    OrgId,
    EmployeeId,
    PeriodMonth,
    PeriodYear,
    BasicSalaryCents,
    GrossCents,
    Allowances,
    Deductions,
    TotalDeductionsCents,
    OvertimeCents,
    BonusCents,
    TaxCents,
    NetCents,
    Currency,
    Status,
    PaidAt,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PerformanceReviews {
    Table,
    Id,
    OrgId,
    EmployeeId,
    ReviewerId,
    ReviewPeriod,
    ReviewType,
    Status,
    SelfRating,
    ReviewerRating,
    ManagerRating,
    OverallRating,
    Goals,
    Achievements,
    AreasForImprovement,
    Feedback,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn employee_fk(name: &str, table: impl IntoIden, column: impl IntoIden) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table.into_iden(), column.into_iden())
        .to(Employees::Table, Employees::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

fn created_updated(created: impl IntoIden, updated: impl IntoIden) -> [ColumnDef; 2] {
    [
        ColumnDef::new(created)
            .timestamp_with_time_zone()
            .not_null()
            .to_owned(),
        ColumnDef::new(updated)
            .timestamp_with_time_zone()
            .not_null()
            .to_owned(),
    ]
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let [mut created, mut updated] =
            created_updated(AttendanceRecords::CreatedAt, AttendanceRecords::UpdatedAt);
        manager
            .create_table(
                Table::create()
                    .table(AttendanceRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AttendanceRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AttendanceRecords::OrgId).uuid().not_null())
                    .col(ColumnDef::new(AttendanceRecords::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(AttendanceRecords::Date).date().not_null())
                    .col(ColumnDef::new(AttendanceRecords::ClockIn).timestamp_with_time_zone())
                    .col(ColumnDef::new(AttendanceRecords::ClockOut).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AttendanceRecords::BreakMinutes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AttendanceRecords::HoursWorked)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(AttendanceRecords::OvertimeHours)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(AttendanceRecords::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(AttendanceRecords::WorkFromHome)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AttendanceRecords::Notes).string_len(500))
                    .col(&mut created)
                    .col(&mut updated)
                    .foreign_key(&mut employee_fk(
                        "fk_attendance_employee",
                        AttendanceRecords::Table,
                        AttendanceRecords::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_attendance_employee_date")
                    .table(AttendanceRecords::Table)
                    .col(AttendanceRecords::EmployeeId)
                    .col(AttendanceRecords::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let [mut created, mut updated] =
            created_updated(LeaveRequests::CreatedAt, LeaveRequests::UpdatedAt);
        manager
            .create_table(
                Table::create()
                    .table(LeaveRequests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LeaveRequests::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(LeaveRequests::OrgId).uuid().not_null())
                    .col(ColumnDef::new(LeaveRequests::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(LeaveRequests::LeaveType).string_len(16).not_null())
                    .col(ColumnDef::new(LeaveRequests::StartDate).date().not_null())
                    .col(ColumnDef::new(LeaveRequests::EndDate).date().not_null())
                    .col(ColumnDef::new(LeaveRequests::DaysRequested).integer().not_null())
                    .col(ColumnDef::new(LeaveRequests::Reason).string_len(500))
                    .col(ColumnDef::new(LeaveRequests::Status).string_len(16).not_null())
                    .col(ColumnDef::new(LeaveRequests::ApproverId).uuid())
                    .col(
                        ColumnDef::new(LeaveRequests::IsEmergency)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(LeaveRequests::WorkCoverage).string_len(200))
                    .col(ColumnDef::new(LeaveRequests::ApprovedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(LeaveRequests::RejectedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(LeaveRequests::RejectionReason).string_len(200))
                    .col(ColumnDef::new(LeaveRequests::CancelledAt).timestamp_with_time_zone())
                    .col(&mut created)
                    .col(&mut updated)
                    .foreign_key(&mut employee_fk(
                        "fk_leave_employee",
                        LeaveRequests::Table,
                        LeaveRequests::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_leave_employee_status")
                    .table(LeaveRequests::Table)
                    .col(LeaveRequests::EmployeeId)
                    .col(LeaveRequests::Status)
                    .to_owned(),
            )
            .await?;

        let [mut created, mut updated] =
            created_updated(PayrollRecords::CreatedAt, PayrollRecords::UpdatedAt);
        manager
            .create_table(
                Table::create()
                    .table(PayrollRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PayrollRecords::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PayrollRecords::OrgId).uuid().not_null())
                    .col(ColumnDef::new(PayrollRecords::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(PayrollRecords::PeriodMonth).integer().not_null())
                    .col(ColumnDef::new(PayrollRecords::PeriodYear).integer().not_null())
                    .col(
                        ColumnDef::new(PayrollRecords::BasicSalaryCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PayrollRecords::GrossCents).big_integer().not_null())
                    .col(ColumnDef::new(PayrollRecords::Allowances).json().not_null())
                    .col(ColumnDef::new(PayrollRecords::Deductions).json().not_null())
                    .col(
                        ColumnDef::new(PayrollRecords::TotalDeductionsCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PayrollRecords::OvertimeCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PayrollRecords::BonusCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PayrollRecords::TaxCents).big_integer().not_null())
                    .col(ColumnDef::new(PayrollRecords::NetCents).big_integer().not_null())
                    .col(ColumnDef::new(PayrollRecords::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(PayrollRecords::Status).string_len(16).not_null())
                    .col(ColumnDef::new(PayrollRecords::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PayrollRecords::Notes).string_len(500))
                    .col(&mut created)
                    .col(&mut updated)
                    .foreign_key(&mut employee_fk(
                        "fk_payroll_employee",
                        PayrollRecords::Table,
                        PayrollRecords::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_payroll_employee_period")
                    .table(PayrollRecords::Table)
                    .col(PayrollRecords::EmployeeId)
                    .col(PayrollRecords::PeriodYear)
                    .col(PayrollRecords::PeriodMonth)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let [mut created, mut updated] =
            created_updated(PerformanceReviews::CreatedAt, PerformanceReviews::UpdatedAt);
        manager
            .create_table(
                Table::create()
                    .table(PerformanceReviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PerformanceReviews::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PerformanceReviews::OrgId).uuid().not_null())
                    .col(ColumnDef::new(PerformanceReviews::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(PerformanceReviews::ReviewerId).uuid().not_null())
                    .col(
                        ColumnDef::new(PerformanceReviews::ReviewPeriod)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PerformanceReviews::ReviewType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PerformanceReviews::Status).string_len(20).not_null())
                    .col(ColumnDef::new(PerformanceReviews::SelfRating).integer())
                    .col(ColumnDef::new(PerformanceReviews::ReviewerRating).integer())
                    .col(ColumnDef::new(PerformanceReviews::ManagerRating).integer())
                    .col(ColumnDef::new(PerformanceReviews::OverallRating).double())
                    .col(ColumnDef::new(PerformanceReviews::Goals).text())
                    .col(ColumnDef::new(PerformanceReviews::Achievements).text())
                    .col(ColumnDef::new(PerformanceReviews::AreasForImprovement).text())
                    .col(ColumnDef::new(PerformanceReviews::Feedback).text())
                    .col(
                        ColumnDef::new(PerformanceReviews::CompletedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(&mut created)
                    .col(&mut updated)
                    .foreign_key(&mut employee_fk(
                        "fk_reviews_employee",
                        PerformanceReviews::Table,
                        PerformanceReviews::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_reviews_employee_period_type")
                    .table(PerformanceReviews::Table)
                    .col(PerformanceReviews::EmployeeId)
                    .col(PerformanceReviews::ReviewPeriod)
                    .col(PerformanceReviews::ReviewType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            PerformanceReviews::Table.into_iden(),
            PayrollRecords::Table.into_iden(),
            LeaveRequests::Table.into_iden(),
            AttendanceRecords::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
