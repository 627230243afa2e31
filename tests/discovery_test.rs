use http::StatusCode;
use serde_json::Value;

mod common;

use common::{authorized, scim_path, setup_default_app, BASE_URL, PROVIDER};

#[tokio::test]
async fn test_service_provider_config() {
    let (server, _) = setup_default_app();

    let response = authorized(server.get(&scim_path(PROVIDER, "ServiceProviderConfig"))).await;
    response.assert_status_ok();
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/scim+json"
    );

    let config: Value = response.json();
    assert_eq!(
        config["schemas"][0],
        "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig"
    );
    assert_eq!(config["patch"]["supported"], true);
    assert_eq!(config["bulk"]["supported"], false);
    assert_eq!(config["filter"]["supported"], true);
    assert_eq!(config["filter"]["maxResults"], 1000);
    assert_eq!(config["changePassword"]["supported"], false);
    assert_eq!(config["sort"]["supported"], false);
    assert_eq!(config["etag"]["supported"], false);
    assert_eq!(config["authenticationSchemes"][0]["type"], "oauthbearertoken");
    assert_eq!(
        config["meta"]["location"],
        format!("{}/v1-scim/{}/ServiceProviderConfig", BASE_URL, PROVIDER)
    );
}

#[tokio::test]
async fn test_resource_types() {
    let (server, _) = setup_default_app();

    let list: Value = authorized(server.get(&scim_path(PROVIDER, "ResourceTypes")))
        .await
        .json();
    assert_eq!(list["totalResults"], 2);

    let resources = list["Resources"].as_array().unwrap();
    let user = resources.iter().find(|r| r["id"] == "User").unwrap();
    assert_eq!(user["endpoint"], "/Users");
    assert_eq!(user["schema"], "urn:ietf:params:scim:schemas:core:2.0:User");
    let group = resources.iter().find(|r| r["id"] == "Group").unwrap();
    assert_eq!(group["endpoint"], "/Groups");
}

#[tokio::test]
async fn test_resource_type_by_id() {
    let (server, _) = setup_default_app();

    let response = authorized(server.get(&scim_path(PROVIDER, "ResourceTypes/Group"))).await;
    response.assert_status_ok();
    let group: Value = response.json();
    assert_eq!(group["name"], "Group");
    assert_eq!(
        group["meta"]["location"],
        format!("{}/v1-scim/{}/ResourceTypes/Group", BASE_URL, PROVIDER)
    );

    authorized(server.get(&scim_path(PROVIDER, "ResourceTypes/Device")))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_schemas() {
    let (server, _) = setup_default_app();

    let list: Value = authorized(server.get(&scim_path(PROVIDER, "Schemas")))
        .await
        .json();
    assert_eq!(list["totalResults"], 2);

    let ids: Vec<&str> = list["Resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"urn:ietf:params:scim:schemas:core:2.0:User"));
    assert!(ids.contains(&"urn:ietf:params:scim:schemas:core:2.0:Group"));
}

#[tokio::test]
async fn test_schema_by_id() {
    let (server, _) = setup_default_app();

    let response = authorized(server.get(&scim_path(
        PROVIDER,
        "Schemas/urn:ietf:params:scim:schemas:core:2.0:Group",
    )))
    .await;
    response.assert_status_ok();

    let schema: Value = response.json();
    assert_eq!(schema["name"], "Group");
    let members = schema["attributes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["name"] == "members")
        .unwrap();
    assert_eq!(members["multiValued"], true);
    assert_eq!(members["subAttributes"].as_array().unwrap().len(), 3);

    authorized(server.get(&scim_path(
        PROVIDER,
        "Schemas/urn:ietf:params:scim:schemas:extension:enterprise:2.0:User",
    )))
    .await
    .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_discovery_requires_token() {
    let (server, _) = setup_default_app();

    for endpoint in ["ServiceProviderConfig", "ResourceTypes", "Schemas"] {
        server
            .get(&scim_path(PROVIDER, endpoint))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
