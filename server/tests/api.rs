use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use hrms_server::{AppConfig, AppState, build_router};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect, ensure_default_org};
use platform_notify::MemoryMailer;
use products_hr::seed::{DEMO_PASSWORD, SeededHr, seed_demo};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN: &str = "admin@hrms.test";
const HR: &str = "hr@hrms.test";
const MANAGER: &str = "manager@hrms.test";
const EMPLOYEE: &str = "employee@hrms.test";
const BOUNDARY: &str = "hrms-test-boundary";

struct TestApp {
    router: Router,
    db: DbPool,
    mailer: MemoryMailer,
    seeded: SeededHr,
    _uploads: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let db = connect(&DatabaseSettings::new("sqlite::memory:")).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let org_id = ensure_default_org(&db, "acme", "Acme").await.unwrap();
        let seeded = seed_demo(&db, org_id).await.unwrap();

        let uploads = TempDir::new().unwrap();
        let upload_dir = uploads.path().to_string_lossy().to_string();
        let config = AppConfig::from_lookup(|key| match key {
            "UPLOAD_DIR" => Some(upload_dir.clone()),
            "COMPANY_NAME" => Some("Acme".into()),
            "DEFAULT_ORG_SLUG" => Some("acme".into()),
            _ => None,
        })
        .unwrap();
        let mailer = MemoryMailer::default();
        let state = AppState::new(db.clone(), config, org_id).with_mailer(Arc::new(mailer.clone()));
        Self {
            router: build_router(state),
            db,
            mailer,
            seeded,
            _uploads: uploads,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": DEMO_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }
}

/// One file part: field, file name, content type, bytes.
type Part<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

fn multipart_parts(parts: &[Part<'_>]) -> Body {
    let mut body = Vec::new();
    for (field, file_name, content_type, contents) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart(field: &str, file_name: &str, content_type: &str, contents: &[u8]) -> Body {
    multipart_parts(&[(field, file_name, content_type, contents)])
}

fn upload_request(uri: &str, token: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn health_reports_database() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["dbOk"], true);
}

#[tokio::test]
async fn unknown_routes_answer_json_404() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn staff_routes_require_a_token_and_the_right_role() {
    let app = TestApp::new().await;
    let (status, _) = app.call(Method::GET, "/api/employees", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login(EMPLOYEE).await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/employees",
            Some(&token),
            Some(json!({
                "firstName": "New",
                "lastName": "Hire",
                "email": "new@hrms.test",
                "position": "Analyst",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["userRole"], "EMPLOYEE");
    assert!(body["required"].is_string());
}

#[tokio::test]
async fn login_sets_http_only_cookies_that_authenticate() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": HR, "password": DEMO_PASSWORD }).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect::<Vec<_>>();
    let access = cookies
        .iter()
        .find(|c| c.starts_with("token="))
        .expect("access cookie");
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Strict"));
    assert!(!access.contains("Secure"));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));

    let pair = access.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], HR);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": HR, "password": "not-the-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_writes_land_in_the_audit_trail() {
    let app = TestApp::new().await;
    let token = app.login(ADMIN).await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/departments",
            Some(&token),
            Some(json!({ "name": "Finance", "description": "Money matters" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let mut entries = Vec::new();
    for _ in 0..20 {
        let (status, body) = app.call(Method::GET, "/api/audit-logs", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        entries = body["auditLogs"].as_array().cloned().unwrap_or_default();
        if !entries.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(
        entries
            .iter()
            .any(|entry| entry["path"] == "/api/departments" && entry["action"] == "CREATE"),
        "{entries:?}"
    );
}

#[tokio::test]
async fn candidate_applies_with_a_resume() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/candidates/register",
            None,
            Some(json!({
                "email": "casey@example.com",
                "password": "Secret123",
                "firstName": "Casey",
                "lastName": "Jones",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/candidates/resume")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart("resume", "cv.pdf", "application/pdf", b"%PDF-1.4 resume"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let resume_path = body["resumePath"].as_str().unwrap().to_string();
    assert!(resume_path.starts_with("resumes/"));

    let job_id = app.seeded.job_posting_id.unwrap();
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/candidates/apply/{job_id}"),
            Some(&token),
            Some(json!({ "coverLetter": "I like backends." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, _) = app
        .call(Method::POST, &format!("/api/candidates/apply/{job_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut sent = Vec::new();
    for _ in 0..20 {
        sent = app.mailer.sent().await;
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "casey@example.com");
    assert!(sent[0].text.contains("Backend Engineer"));

    let hr = app.login(HR).await;
    let request = Request::builder()
        .uri(format!("/api/files/{resume_path}"))
        .header(header::AUTHORIZATION, format!("Bearer {hr}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
}

#[tokio::test]
async fn staff_tokens_cannot_use_candidate_routes() {
    let app = TestApp::new().await;
    let token = app.login(HR).await;
    let (status, _) = app
        .call(Method::GET, "/api/candidates/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn file_paths_cannot_escape_the_upload_root() {
    let app = TestApp::new().await;
    let token = app.login(HR).await;
    let (status, _) = app
        .call(Method::GET, "/api/files/resumes/..", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(Method::GET, "/api/files/resumes/missing.pdf", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn graphql_dashboard_counts_the_seeded_staff() {
    let app = TestApp::new().await;
    let token = app.login(HR).await;
    let (status, body) = app
        .call(
            Method::POST,
            "/graphql",
            Some(&token),
            Some(json!({ "query": "{ hrOverview { headcount } }" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hrOverview"]["headcount"], 4, "{body}");
}

#[tokio::test]
async fn auto_reply_validates_before_reaching_the_provider() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/email/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], false);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/email/send-auto-reply",
            None,
            Some(json!({ "to_name": "Casey" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "to_name and to_email are required");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/email/send-auto-reply",
            None,
            Some(json!({ "to_name": "Casey", "to_email": "casey@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn seeded_database_is_reachable_from_tests() {
    let app = TestApp::new().await;
    let org = platform_db::find_org_by_slug(&app.db, "acme").await.unwrap();
    assert!(org.is_some());
}

#[tokio::test]
async fn malformed_payloads_answer_json_400() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(Method::POST, "/api/auth/login", None, Some(json!({ "email": "a@b.co" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation error");
    assert_eq!(body["errors"][0]["field"], "body");

    let token = app.login(ADMIN).await;
    let (status, body) = app
        .call(Method::POST, "/api/departments", Some(&token), Some(json!({ "name": 42 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "body");

    let (status, body) = app
        .call(Method::GET, "/api/employees/not-a-uuid", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "path");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/departments")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("name=Finance"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation error");
}

#[tokio::test]
async fn uploads_enforce_type_size_and_count() {
    let app = TestApp::new().await;
    let token = app.login(EMPLOYEE).await;

    let zip = upload_request(
        "/api/uploads/documents",
        &token,
        multipart("documents", "bundle.zip", "application/zip", b"PK\x03\x04"),
    );
    let (status, body) = app.send(zip).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FILE_TYPE");

    let large = vec![0u8; 2 * 1024 * 1024 + 1];
    let oversized = upload_request(
        "/api/uploads/avatar",
        &token,
        multipart("avatar", "me.png", "image/png", &large),
    );
    let (status, body) = app.send(oversized).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FILE_SIZE_EXCEEDED");

    let two = upload_request(
        "/api/uploads/avatar",
        &token,
        multipart_parts(&[
            ("avatar", "a.png", "image/png", b"\x89PNG one"),
            ("avatar", "b.png", "image/png", b"\x89PNG two"),
        ]),
    );
    let (status, body) = app.send(two).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FILE_COUNT_EXCEEDED");

    let one = upload_request(
        "/api/uploads/avatar",
        &token,
        multipart("avatar", "me.png", "image/png", b"\x89PNG fine"),
    );
    let (status, body) = app.send(one).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["file"]["url"].as_str().unwrap().starts_with("/api/files/avatars/"));
}

/// A user in a second org, able to log in with the demo password.
async fn outsider(app: &TestApp) -> String {
    use entity::users;
    use sea_orm::{ActiveModelTrait, ActiveValue::Set};

    let org_id = ensure_default_org(&app.db, "globex", "Globex").await.unwrap();
    let ts = chrono::Utc::now().fixed_offset();
    users::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        org_id: Set(org_id),
        email: Set("hr@globex.test".into()),
        username: Set("globex_hr".into()),
        password_hash: Set(platform_authn::hash_password(DEMO_PASSWORD).unwrap()),
        role: Set(users::Role::Hr),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(&app.db)
    .await
    .unwrap();
    app.login("hr@globex.test").await
}

#[tokio::test]
async fn documents_are_readable_only_by_their_owner_and_hr_of_the_org() {
    let app = TestApp::new().await;
    let owner = app.login(EMPLOYEE).await;
    let request = upload_request(
        "/api/uploads/documents",
        &owner,
        multipart("documents", "contract.pdf", "application/pdf", b"%PDF-1.4 contract"),
    );
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let url = body["files"][0]["url"].as_str().unwrap().to_string();

    let (status, _) = app.call(Method::GET, &url, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let hr = app.login(HR).await;
    let (status, _) = app.call(Method::GET, &url, Some(&hr), None).await;
    assert_eq!(status, StatusCode::OK);

    let colleague = app.login(MANAGER).await;
    let (status, _) = app.call(Method::GET, &url, Some(&colleague), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stranger = outsider(&app).await;
    let (status, _) = app.call(Method::GET, &url, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::GET, &url, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Registers a candidate with a resume and applies to the seeded posting.
async fn applied(app: &TestApp, email: &str) -> String {
    let (status, body) = app
        .call(
            Method::POST,
            "/api/candidates/register",
            None,
            Some(json!({
                "email": email,
                "password": "Secret123",
                "firstName": "Riley",
                "lastName": "Chen",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["token"].as_str().unwrap().to_string();
    let request = upload_request(
        "/api/candidates/resume",
        &token,
        multipart("resume", "cv.pdf", "application/pdf", b"%PDF-1.4 resume"),
    );
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let job_id = app.seeded.job_posting_id.unwrap();
    let (status, body) = app
        .call(Method::POST, &format!("/api/candidates/apply/{job_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["application"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn hiring_runs_from_interview_to_onboarding() {
    let app = TestApp::new().await;
    let application_id = applied(&app, "riley@example.com").await;
    let hr = app.login(HR).await;
    let when = (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/interviews",
            Some(&hr),
            Some(json!({
                "applicationId": application_id,
                "scheduledAt": when,
                "interviewType": "IN_PERSON",
                "location": "HQ, room 4",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["interview"]["status"], "SCHEDULED");
    assert_eq!(body["interview"]["candidateName"], "Riley Chen");
    let interview_id = body["interview"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/interviews/{interview_id}/status"),
            Some(&hr),
            Some(json!({ "status": "COMPLETED", "feedback": "Hire" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/onboarding/convert",
            Some(&hr),
            Some(json!({ "applicationId": application_id, "salaryCents": 6_800_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["conversion"]["temporaryPassword"].is_string());
    let employee_id = body["conversion"]["employee"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["conversion"]["onboarding"].as_array().unwrap().len(), 5);

    let (status, body) = app
        .call(Method::GET, &format!("/api/onboarding/{employee_id}"), Some(&hr), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["onboarding"]["total"], 5);
    assert_eq!(body["onboarding"]["status"], "PENDING");

    let employee = app.login(EMPLOYEE).await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/onboarding/convert",
            Some(&employee),
            Some(json!({ "applicationId": application_id })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_manage_accounts_and_reports_are_kept() {
    let app = TestApp::new().await;
    let hr = app.login(HR).await;
    let (status, body) = app.call(Method::GET, "/api/auth/users", Some(&hr), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["pagination"]["total"], 4);
    let users = body["users"].as_array().unwrap();
    let find = |email: &str| {
        users
            .iter()
            .find(|u| u["email"] == email)
            .and_then(|u| u["id"].as_str())
            .unwrap()
            .to_string()
    };
    let (admin_id, employee_id) = (find(ADMIN), find(EMPLOYEE));

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/auth/users/{admin_id}/status"),
            Some(&hr),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/auth/users/{employee_id}/status"),
            Some(&hr),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["isActive"], false);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": EMPLOYEE, "password": DEMO_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let today = chrono::Utc::now().date_naive();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/reports/generate",
            Some(&hr),
            Some(json!({
                "reportType": "employee",
                "startDate": (today - chrono::Duration::days(7)).to_string(),
                "endDate": today.to_string(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["report"]["summary"]["active"], app.seeded.employees.len() - 1);

    let (status, body) = app.call(Method::GET, "/api/reports/history", Some(&hr), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reports"][0]["reportType"], "employee");
}
