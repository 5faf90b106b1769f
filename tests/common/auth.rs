use axum::http::Method;
use axum::Router;

use super::app::ADMIN_EMAIL;
use super::http::{request, response_json};

pub const PASSWORD: &str = "Passw0rd!";

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}

pub async fn register(app: &Router, name: &str, email: &str) -> String {
    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
        })),
        &[],
    )
    .await;

    let (status, _headers, body) = response_json(response).await;
    assert!(status.is_success(), "register failed: {body}");
    body["data"]["token"]
        .as_str()
        .expect("token in register response")
        .to_string()
}

pub async fn login_and_get_token(app: &Router) -> String {
    let email = format!("user-{}@test.com", uuid::Uuid::new_v4().simple());
    register(app, "Learner", &email).await
}

pub async fn setup_admin_and_get_token(app: &Router) -> String {
    register(app, "Admin", ADMIN_EMAIL).await
}
