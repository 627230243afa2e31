#![allow(dead_code)]

use axum_test::{TestRequest, TestServer};
use http::StatusCode;
use scim_provisioning::config::{AppConfig, BootstrapToken};
use scim_provisioning::directory::InMemoryDirectory;
use scim_provisioning::{bootstrap_directory, build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;

pub const PROVIDER: &str = "okta";
pub const TOKEN: &str = "okta-test-token-123";
pub const OTHER_PROVIDER: &str = "azure";
pub const OTHER_TOKEN: &str = "azure-test-token-456";
pub const DISABLED_PROVIDER: &str = "github";
pub const DISABLED_TOKEN: &str = "github-test-token-789";
pub const BASE_URL: &str = "https://scim.example.com";
pub const DEFAULT_ADMIN_ID: &str = "user-admin";

/// Tokens for two enabled providers and one disabled provider.
pub fn create_test_app_config() -> AppConfig {
    let mut config = AppConfig::default_config();
    config.server.base_url = Some(BASE_URL.to_string());
    config.providers.disabled = vec![DISABLED_PROVIDER.to_string()];
    config.bootstrap.tokens = vec![
        BootstrapToken {
            provider: PROVIDER.to_string(),
            token: TOKEN.to_string(),
        },
        BootstrapToken {
            provider: OTHER_PROVIDER.to_string(),
            token: OTHER_TOKEN.to_string(),
        },
        BootstrapToken {
            provider: DISABLED_PROVIDER.to_string(),
            token: DISABLED_TOKEN.to_string(),
        },
    ];
    config
}

/// Builds the full router over a freshly seeded in-memory directory.
pub fn setup_test_app(config: AppConfig) -> (TestServer, Arc<InMemoryDirectory>) {
    let directory = bootstrap_directory(&config).unwrap();
    let app = build_router(AppState::in_memory(directory.clone(), config));
    (TestServer::new(app).unwrap(), directory)
}

pub fn setup_default_app() -> (TestServer, Arc<InMemoryDirectory>) {
    setup_test_app(create_test_app_config())
}

pub fn scim_path(provider: &str, endpoint: &str) -> String {
    format!("/v1-scim/{}/{}", provider, endpoint)
}

pub fn users_path() -> String {
    scim_path(PROVIDER, "Users")
}

pub fn user_path(id: &str) -> String {
    format!("{}/{}", users_path(), id)
}

pub fn groups_path() -> String {
    scim_path(PROVIDER, "Groups")
}

pub fn group_path(id: &str) -> String {
    format!("{}/{}", groups_path(), id)
}

pub fn with_token(request: TestRequest, token: &str) -> TestRequest {
    request.add_header("authorization", format!("Bearer {}", token))
}

pub fn authorized(request: TestRequest) -> TestRequest {
    with_token(request, TOKEN)
}

pub fn create_test_user_json(username: &str, email: Option<&str>) -> Value {
    let mut user = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "userName": username,
        "externalId": format!("ext-{}", username),
        "active": true
    });
    if let Some(email) = email {
        user["emails"] = json!([{"value": email, "primary": true}]);
    }
    user
}

pub fn create_test_group_json(display_name: &str, member_ids: &[&str]) -> Value {
    let members: Vec<Value> = member_ids
        .iter()
        .map(|id| json!({"value": id, "type": "User"}))
        .collect();
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "displayName": display_name,
        "externalId": format!("ext-{}", display_name),
        "members": members
    })
}

pub fn patch_body(operations: Value) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
        "Operations": operations
    })
}

/// Creates a user through the API and returns its ID.
pub async fn create_user(server: &TestServer, username: &str) -> String {
    let response = authorized(server.post(&users_path()))
        .json(&create_test_user_json(username, None))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().to_string()
}

/// Creates a group through the API and returns the response body.
pub async fn create_group(server: &TestServer, display_name: &str, member_ids: &[&str]) -> Value {
    let response = authorized(server.post(&groups_path()))
        .json(&create_test_group_json(display_name, member_ids))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

/// Member IDs of a group resource, in response order.
pub fn member_ids(group: &Value) -> Vec<String> {
    group["members"]
        .as_array()
        .map(|members| {
            members
                .iter()
                .map(|m| m["value"].as_str().unwrap().to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn assert_scim_error(body: &Value, status: &str, scim_type: Option<&str>) {
    assert_eq!(
        body["schemas"][0],
        "urn:ietf:params:scim:api:messages:2.0:Error"
    );
    assert_eq!(body["status"], status);
    match scim_type {
        Some(scim_type) => assert_eq!(body["scimType"], scim_type),
        None => assert!(body.get("scimType").is_none()),
    }
}
