use entity::{employees, users};
use platform_api::{ApiError, ApiResult};
use platform_authn::AuthnError;
use platform_authz::{AuthzError, Permission, PolicyEngine, Role};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::db_error;

/// The authenticated staff member a service call runs as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub role: Role,
    pub employee_id: Option<Uuid>,
}

impl Actor {
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        PolicyEngine.check(self.role, permission).map_err(authz_error)
    }

    /// Role gate for routes restricted to a fixed role list.
    pub fn require_role(&self, allowed: &[Role]) -> ApiResult<()> {
        PolicyEngine
            .require_any(self.role, allowed)
            .map_err(|_| ApiError::Denied {
                required: allowed
                    .iter()
                    .map(|role| role.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                role: self.role.as_str().to_string(),
            })
    }

    pub fn is_hr_admin(&self) -> bool {
        self.role.is_hr_admin()
    }

    /// The actor's own employee profile, required by self-service routes.
    pub fn employee_id(&self) -> ApiResult<Uuid> {
        self.employee_id
            .ok_or_else(|| ApiError::not_found("Employee profile not found"))
    }
}

pub fn authz_error(err: AuthzError) -> ApiError {
    match err {
        AuthzError::Denied { permission, role } => ApiError::Denied {
            required: permission.to_string(),
            role: role.to_string(),
        },
        AuthzError::UnknownRole(role) => ApiError::forbidden(format!("Unknown role {role}")),
    }
}

pub fn token_error(err: AuthnError) -> ApiError {
    match err {
        AuthnError::Expired => ApiError::unauthorized("Token expired"),
        AuthnError::Encode(_) | AuthnError::Hash(_) => {
            ApiError::internal(anyhow::Error::new(err))
        }
        AuthnError::Invalid | AuthnError::WrongKind => ApiError::unauthorized("Invalid token"),
    }
}

pub fn role_from_entity(role: users::Role) -> Role {
    match role {
        users::Role::Admin => Role::Admin,
        users::Role::Hr => Role::Hr,
        users::Role::Manager => Role::Manager,
        users::Role::Employee => Role::Employee,
        users::Role::Candidate => Role::Candidate,
    }
}

pub fn role_to_entity(role: Role) -> users::Role {
    match role {
        Role::Admin => users::Role::Admin,
        Role::Hr => users::Role::Hr,
        Role::Manager => users::Role::Manager,
        Role::Employee => users::Role::Employee,
        Role::Candidate => users::Role::Candidate,
    }
}

/// Resolve a token subject into an [`Actor`]. Missing or deactivated
/// accounts are rejected even while their token is still valid.
pub async fn load_actor<C: ConnectionTrait>(db: &C, user_id: Uuid) -> ApiResult<Actor> {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated"));
    }
    let employee = employees::Entity::find()
        .filter(employees::Column::UserId.eq(user.id))
        .one(db)
        .await
        .map_err(db_error)?;
    Ok(Actor {
        user_id: user.id,
        org_id: user.org_id,
        role: role_from_entity(user.role),
        employee_id: employee.map(|e| e.id),
    })
}

/// Load an employee of the actor's org. Other orgs' rows look missing.
pub(crate) async fn org_employee<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<employees::Model> {
    employees::Entity::find_by_id(id)
        .filter(employees::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            role,
            employee_id: None,
        }
    }

    #[test]
    fn denied_permission_names_requirement() {
        let err = actor(Role::Employee)
            .require(Permission::PayrollWrite)
            .unwrap_err();
        match err {
            ApiError::Denied { required, role } => {
                assert_eq!(required, "payroll:write");
                assert_eq!(role, "EMPLOYEE");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(actor(Role::Hr).require(Permission::PayrollWrite).is_ok());
    }

    #[test]
    fn role_gate_lists_allowed_roles() {
        let err = actor(Role::Employee)
            .require_role(&[Role::Admin, Role::Hr])
            .unwrap_err();
        assert!(matches!(err, ApiError::Denied { ref required, .. } if required == "ADMIN,HR"));
    }

    #[test]
    fn missing_profile_is_not_found() {
        let err = actor(Role::Admin).employee_id().unwrap_err();
        assert_eq!(err.status().as_u16(), 404);
    }

    #[test]
    fn token_errors_are_unauthorized() {
        assert_eq!(
            token_error(AuthnError::Expired).to_string(),
            "Token expired"
        );
        assert_eq!(
            token_error(AuthnError::WrongKind).to_string(),
            "Invalid token"
        );
    }

    #[test]
    fn roles_round_trip_between_layers() {
        for role in [Role::Admin, Role::Hr, Role::Manager, Role::Employee, Role::Candidate] {
            assert_eq!(role_from_entity(role_to_entity(role)), role);
        }
    }
}
