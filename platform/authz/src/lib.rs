//! Authorization primitives for the HR modules.
//!
//! Access is decided by a static role -> permission table. Ownership rules
//! (a manager only sees their team, an employee only their own records) live
//! next to the data in the domain services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("permission {permission} denied for role {role}")]
    Denied {
        permission: &'static str,
        role: &'static str,
    },
    #[error("unknown role {0}")]
    UnknownRole(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Hr,
    Manager,
    Employee,
    Candidate,
}

impl Role {
    pub const STAFF: [Role; 4] = [Role::Admin, Role::Hr, Role::Manager, Role::Employee];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Hr => "HR",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
            Role::Candidate => "CANDIDATE",
        }
    }

    /// ADMIN and HR see every record in their org.
    pub fn is_hr_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "HR" => Ok(Role::Hr),
            "MANAGER" => Ok(Role::Manager),
            "EMPLOYEE" => Ok(Role::Employee),
            "CANDIDATE" => Ok(Role::Candidate),
            _ => Err(AuthzError::UnknownRole(value.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    UsersRead,
    UsersWrite,
    UsersDelete,
    EmployeesRead,
    EmployeesWrite,
    EmployeesDelete,
    AttendanceRead,
    AttendanceWrite,
    AttendanceClock,
    LeavesRead,
    LeavesWrite,
    LeavesApprove,
    PayrollRead,
    PayrollWrite,
    PayrollRelease,
    PerformanceRead,
    PerformanceWrite,
    ReportsRead,
    DepartmentsRead,
    DepartmentsWrite,
    RecruitmentRead,
    RecruitmentWrite,
    FilesUpload,
}

const ADMIN_HR: &[Role] = &[Role::Admin, Role::Hr];
const ADMIN_HR_MANAGER: &[Role] = &[Role::Admin, Role::Hr, Role::Manager];
const STAFF: &[Role] = &Role::STAFF;
const ADMIN_ONLY: &[Role] = &[Role::Admin];

impl Permission {
    pub const ALL: [Permission; 23] = [
        Permission::UsersRead,
        Permission::UsersWrite,
        Permission::UsersDelete,
        Permission::EmployeesRead,
        Permission::EmployeesWrite,
        Permission::EmployeesDelete,
        Permission::AttendanceRead,
        Permission::AttendanceWrite,
        Permission::AttendanceClock,
        Permission::LeavesRead,
        Permission::LeavesWrite,
        Permission::LeavesApprove,
        Permission::PayrollRead,
        Permission::PayrollWrite,
        Permission::PayrollRelease,
        Permission::PerformanceRead,
        Permission::PerformanceWrite,
        Permission::ReportsRead,
        Permission::DepartmentsRead,
        Permission::DepartmentsWrite,
        Permission::RecruitmentRead,
        Permission::RecruitmentWrite,
        Permission::FilesUpload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::UsersRead => "users:read",
            Permission::UsersWrite => "users:write",
            Permission::UsersDelete => "users:delete",
            Permission::EmployeesRead => "employees:read",
            Permission::EmployeesWrite => "employees:write",
            Permission::EmployeesDelete => "employees:delete",
            Permission::AttendanceRead => "attendance:read",
            Permission::AttendanceWrite => "attendance:write",
            Permission::AttendanceClock => "attendance:clock",
            Permission::LeavesRead => "leaves:read",
            Permission::LeavesWrite => "leaves:write",
            Permission::LeavesApprove => "leaves:approve",
            Permission::PayrollRead => "payroll:read",
            Permission::PayrollWrite => "payroll:write",
            Permission::PayrollRelease => "payroll:release",
            Permission::PerformanceRead => "performance:read",
            Permission::PerformanceWrite => "performance:write",
            Permission::ReportsRead => "reports:read",
            Permission::DepartmentsRead => "departments:read",
            Permission::DepartmentsWrite => "departments:write",
            Permission::RecruitmentRead => "recruitment:read",
            Permission::RecruitmentWrite => "recruitment:write",
            Permission::FilesUpload => "files:upload",
        }
    }

    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Permission::UsersRead | Permission::UsersWrite => ADMIN_HR,
            Permission::UsersDelete => ADMIN_ONLY,
            Permission::EmployeesRead => ADMIN_HR_MANAGER,
            Permission::EmployeesWrite => ADMIN_HR,
            Permission::EmployeesDelete => ADMIN_ONLY,
            Permission::AttendanceRead => STAFF,
            Permission::AttendanceWrite => &[Role::Admin, Role::Hr, Role::Employee],
            Permission::AttendanceClock => STAFF,
            Permission::LeavesRead | Permission::LeavesWrite => STAFF,
            Permission::LeavesApprove => ADMIN_HR_MANAGER,
            Permission::PayrollRead => STAFF,
            Permission::PayrollWrite | Permission::PayrollRelease => ADMIN_HR,
            Permission::PerformanceRead => STAFF,
            Permission::PerformanceWrite => ADMIN_HR_MANAGER,
            Permission::ReportsRead => ADMIN_HR_MANAGER,
            Permission::DepartmentsRead => STAFF,
            Permission::DepartmentsWrite => ADMIN_HR,
            Permission::RecruitmentRead => ADMIN_HR_MANAGER,
            Permission::RecruitmentWrite => ADMIN_HR,
            Permission::FilesUpload => STAFF,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn check(&self, role: Role, permission: Permission) -> Result<(), AuthzError> {
        if permission.allowed_roles().contains(&role) {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                permission: permission.as_str(),
                role: role.as_str(),
            })
        }
    }

    /// Every permission granted to `role`, in table order.
    pub fn permissions_for(&self, role: Role) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|permission| permission.allowed_roles().contains(&role))
            .collect()
    }

    /// Role-only gate used by routes restricted to a fixed set of roles.
    pub fn require_any(&self, role: Role, allowed: &[Role]) -> Result<(), AuthzError> {
        if allowed.contains(&role) {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                permission: "role",
                role: role.as_str(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employees_cannot_touch_payroll_writes() {
        let engine = PolicyEngine;
        assert!(engine.check(Role::Employee, Permission::PayrollRead).is_ok());
        assert_eq!(
            engine.check(Role::Employee, Permission::PayrollWrite),
            Err(AuthzError::Denied {
                permission: "payroll:write",
                role: "EMPLOYEE",
            })
        );
    }

    #[test]
    fn only_admin_deletes_employees() {
        let engine = PolicyEngine;
        assert!(engine.check(Role::Admin, Permission::EmployeesDelete).is_ok());
        assert!(engine.check(Role::Hr, Permission::EmployeesDelete).is_err());
    }

    #[test]
    fn candidates_hold_no_staff_permissions() {
        assert!(PolicyEngine.permissions_for(Role::Candidate).is_empty());
    }

    #[test]
    fn managers_approve_leave_but_do_not_manage_recruitment() {
        let perms = PolicyEngine.permissions_for(Role::Manager);
        assert!(perms.contains(&Permission::LeavesApprove));
        assert!(perms.contains(&Permission::RecruitmentRead));
        assert!(!perms.contains(&Permission::RecruitmentWrite));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("hr".parse::<Role>(), Ok(Role::Hr));
        assert!("owner".parse::<Role>().is_err());
    }
}
