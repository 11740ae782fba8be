use async_graphql::SimpleObject;
use products_hr::auth::{PermissionsView, UserProfile};

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub id: String,
    pub org_id: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub employee: Option<EmployeePayload>,
    pub permissions: Vec<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct EmployeePayload {
    pub id: String,
    pub employee_code: String,
    pub name: String,
    pub position: String,
    pub department: Option<String>,
}

impl MePayload {
    pub fn new(profile: UserProfile, permissions: PermissionsView) -> Self {
        Self {
            id: profile.id.to_string(),
            org_id: profile.org_id.to_string(),
            email: profile.email,
            username: profile.username,
            role: profile.role.as_str().to_string(),
            employee: profile.employee.map(|e| EmployeePayload {
                id: e.id.to_string(),
                employee_code: e.employee_code,
                name: format!("{} {}", e.first_name, e.last_name),
                position: e.position,
                department: e.department_name,
            }),
            permissions: permissions
                .permissions
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}
