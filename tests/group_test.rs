use http::StatusCode;
use scim_provisioning::directory::Directory;
use serde_json::{json, Value};

mod common;

use common::{
    assert_scim_error, authorized, create_group, create_test_group_json, create_user,
    group_path, groups_path, member_ids, patch_body, scim_path, setup_default_app, with_token,
    BASE_URL, DEFAULT_ADMIN_ID, OTHER_PROVIDER, OTHER_TOKEN, PROVIDER,
};

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_create_group_with_members() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    let bob = create_user(&server, "bob").await;

    let response = authorized(server.post(&groups_path()))
        .json(&create_test_group_json("Engineering", &[&bob, &alice]))
        .await;
    response.assert_status(StatusCode::CREATED);

    let group: Value = response.json();
    let id = group["id"].as_str().unwrap();
    assert!(id.starts_with("grp-"));
    assert_eq!(group["schemas"][0], "urn:ietf:params:scim:schemas:core:2.0:Group");
    assert_eq!(group["displayName"], "Engineering");
    assert_eq!(group["externalId"], "ext-Engineering");
    assert_eq!(group["meta"]["resourceType"], "Group");

    let location = format!("{}/v1-scim/{}/Groups/{}", BASE_URL, PROVIDER, id);
    assert_eq!(response.header("location").to_str().unwrap(), location);

    // Members come back ordered by user ID with their userName as display.
    assert_eq!(member_ids(&group), sorted(vec![alice.clone(), bob.clone()]));
    let display: Vec<&str> = group["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["display"].as_str().unwrap())
        .collect();
    assert!(display.contains(&"alice"));
    assert!(display.contains(&"bob"));
}

#[tokio::test]
async fn test_create_group_without_members() {
    let (server, _) = setup_default_app();

    let group = create_group(&server, "Empty", &[]).await;
    assert_eq!(group["members"], json!([]));
}

#[tokio::test]
async fn test_create_group_requires_display_name() {
    let (server, _) = setup_default_app();

    let response = authorized(server.post(&groups_path()))
        .json(&json!({"externalId": "abc"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_scim_error(&response.json(), "400", Some("invalidValue"));
}

#[tokio::test]
async fn test_create_duplicate_group_is_case_insensitive() {
    let (server, _) = setup_default_app();
    create_group(&server, "Engineering", &[]).await;

    let response = authorized(server.post(&groups_path()))
        .json(&create_test_group_json("ENGINEERING", &[]))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_scim_error(&body, "409", Some("uniqueness"));
    assert_eq!(
        body["detail"],
        "Group with displayName \"ENGINEERING\" already exists"
    );
}

#[tokio::test]
async fn test_duplicate_group_folds_non_ascii_case() {
    let (server, _) = setup_default_app();
    create_group(&server, "Équipe", &[]).await;

    let response = authorized(server.post(&groups_path()))
        .json(&create_test_group_json("équipe", &[]))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_scim_error(&response.json(), "409", Some("uniqueness"));

    let list: Value = authorized(server.get(&groups_path())).await.json();
    assert_eq!(list["totalResults"], 1);
}

#[tokio::test]
async fn test_create_group_accepts_null_fields() {
    let (server, _) = setup_default_app();

    let response = authorized(server.post(&groups_path()))
        .json(&json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
            "displayName": "Eng",
            "externalId": null,
            "members": null
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let group: Value = response.json();
    assert_eq!(group["displayName"], "Eng");
    assert_eq!(group["externalId"], "");
    assert_eq!(group["members"], json!([]));
}

#[tokio::test]
async fn test_same_display_name_under_other_provider() {
    let (server, _) = setup_default_app();
    create_group(&server, "Engineering", &[]).await;

    let response = with_token(server.post(&scim_path(OTHER_PROVIDER, "Groups")), OTHER_TOKEN)
        .json(&create_test_group_json("Engineering", &[]))
        .await;

    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_group_rejects_invalid_members_before_writing() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;

    let nested = json!({
        "displayName": "Nested",
        "members": [
            {"value": alice, "type": "User"},
            {"value": "grp-abcde", "type": "Group"}
        ]
    });
    let response = authorized(server.post(&groups_path())).json(&nested).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_scim_error(&body, "400", Some("invalidValue"));
    assert_eq!(body["detail"], "Nested groups are not supported");

    let unknown = create_test_group_json("Unknown", &[&alice, "u-nobody"]);
    let response = authorized(server.post(&groups_path())).json(&unknown).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let list: Value = authorized(server.get(&groups_path())).await.json();
    assert_eq!(list["totalResults"], 0);
}

#[tokio::test]
async fn test_default_admin_can_be_group_member() {
    let (server, _) = setup_default_app();

    // The default admin is a regular user and may be a member.
    let group = create_group(&server, "Admins", &[DEFAULT_ADMIN_ID]).await;
    assert_eq!(member_ids(&group), vec![DEFAULT_ADMIN_ID.to_string()]);
}

#[tokio::test]
async fn test_get_group() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    let created = create_group(&server, "Ops", &[&alice]).await;
    let id = created["id"].as_str().unwrap();

    let group: Value = authorized(server.get(&group_path(id))).await.json();
    assert_eq!(group["displayName"], "Ops");
    assert_eq!(member_ids(&group), vec![alice]);

    let response = authorized(server.get(&group_path(id)))
        .add_query_param("excludedAttributes", "members")
        .await;
    response.assert_status_ok();
    let group: Value = response.json();
    assert!(group.get("members").is_none());
    assert_eq!(group["displayName"], "Ops");
}

#[tokio::test]
async fn test_get_group_of_other_provider_is_not_found() {
    let (server, _) = setup_default_app();
    let created = create_group(&server, "Ops", &[]).await;
    let id = created["id"].as_str().unwrap();

    let response = with_token(
        server.get(&format!("{}/{}", scim_path(OTHER_PROVIDER, "Groups"), id)),
        OTHER_TOKEN,
    )
    .await;
    response.assert_status(StatusCode::NOT_FOUND);

    authorized(server.get(&group_path("grp-nope0")))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_groups() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    create_group(&server, "Ops", &[&alice]).await;
    create_group(&server, "Dev", &[&alice]).await;

    let list: Value = authorized(server.get(&groups_path())).await.json();
    assert_eq!(list["totalResults"], 2);
    for group in list["Resources"].as_array().unwrap() {
        assert_eq!(member_ids(group), vec![alice.clone()]);
    }

    let response = authorized(server.get(&groups_path()))
        .add_query_param("filter", "displayName eq \"ops\"")
        .add_query_param("excludedAttributes", "members")
        .await;
    response.assert_status_ok();
    let list: Value = response.json();
    assert_eq!(list["totalResults"], 1);
    assert_eq!(list["Resources"][0]["displayName"], "Ops");
    assert!(list["Resources"][0].get("members").is_none());

    let response = authorized(server.get(&groups_path()))
        .add_query_param("filter", "externalId eq \"x\"")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_scim_error(&response.json(), "400", Some("invalidFilter"));
}

#[tokio::test]
async fn test_update_group_syncs_members() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    let bob = create_user(&server, "bob").await;
    let carol = create_user(&server, "carol").await;
    let created = create_group(&server, "Ops", &[&alice, &bob]).await;
    let id = created["id"].as_str().unwrap();

    let response = authorized(server.put(&group_path(id)))
        .json(&json!({
            "id": id,
            "displayName": "Ops",
            "externalId": "ext-ops-2",
            "members": [{"value": bob}, {"value": carol}]
        }))
        .await;
    response.assert_status_ok();

    let group: Value = response.json();
    assert_eq!(group["externalId"], "ext-ops-2");
    assert_eq!(member_ids(&group), sorted(vec![bob.clone(), carol.clone()]));

    let response = authorized(server.put(&group_path(id)))
        .json(&json!({"displayName": "Ops", "members": []}))
        .await;
    response.assert_status_ok();
    assert!(member_ids(&response.json()).is_empty());
}

#[tokio::test]
async fn test_update_group_rejects_mismatched_id() {
    let (server, _) = setup_default_app();
    let created = create_group(&server, "Ops", &[]).await;
    let id = created["id"].as_str().unwrap();

    let response = authorized(server.put(&group_path(id)))
        .json(&json!({"id": "grp-other", "displayName": "Ops"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = authorized(server.put(&group_path("grp-nope0")))
        .json(&json!({"displayName": "Ops"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_group_members() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    let bob = create_user(&server, "bob").await;
    let carol = create_user(&server, "carol").await;
    let created = create_group(&server, "Ops", &[&alice]).await;
    let id = created["id"].as_str().unwrap();

    // Okta: add, then remove by filtered path.
    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "add", "path": "members", "value": [{"value": bob}, {"value": carol}]},
            {"op": "remove", "path": format!("members[value eq \"{}\"]", alice)}
        ])))
        .await;
    response.assert_status_ok();
    assert_eq!(
        member_ids(&response.json()),
        sorted(vec![bob.clone(), carol.clone()])
    );

    // Azure AD: remove with the member list as value.
    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "Remove", "path": "members", "value": [{"value": carol}]}
        ])))
        .await;
    response.assert_status_ok();
    assert_eq!(member_ids(&response.json()), vec![bob.clone()]);

    // Removing a non-member is a no-op.
    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "remove", "path": format!("members[value eq \"{}\"]", alice)}
        ])))
        .await;
    response.assert_status_ok();
    assert_eq!(member_ids(&response.json()), vec![bob]);
}

#[tokio::test]
async fn test_patch_group_replace_fields() {
    let (server, _) = setup_default_app();
    let created = create_group(&server, "Ops", &[]).await;
    let id = created["id"].as_str().unwrap();

    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "replace", "value": {"id": id, "displayName": "Ops", "externalId": "ext-9"}}
        ])))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["externalId"], "ext-9");

    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "replace", "path": "displayName", "value": "Operations"}
        ])))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_scim_error(&response.json(), "400", Some("mutability"));

    let group: Value = authorized(server.get(&group_path(id))).await.json();
    assert_eq!(group["displayName"], "Ops");
}

#[tokio::test]
async fn test_patch_group_validates_added_members() {
    let (server, _) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    let created = create_group(&server, "Ops", &[]).await;
    let id = created["id"].as_str().unwrap();

    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "replace", "path": "externalId", "value": "ext-changed"},
            {"op": "add", "path": "members", "value": [{"value": alice}, {"value": "u-nobody"}]}
        ])))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let group: Value = authorized(server.get(&group_path(id))).await.json();
    assert_eq!(group["externalId"], "ext-Ops");
    assert!(member_ids(&group).is_empty());
}

#[tokio::test]
async fn test_patch_group_rejects_unsupported_paths() {
    let (server, _) = setup_default_app();
    let created = create_group(&server, "Ops", &[]).await;
    let id = created["id"].as_str().unwrap();

    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([
            {"op": "add", "path": "owners", "value": [{"value": "u-1"}]}
        ])))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_scim_error(&response.json(), "400", Some("invalidPath"));

    let response = authorized(server.patch(&group_path(id)))
        .json(&patch_body(json!([{"op": "move", "path": "members"}])))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_group_removes_memberships() {
    let (server, directory) = setup_default_app();
    let alice = create_user(&server, "alice").await;
    let created = create_group(&server, "Ops", &[&alice]).await;
    create_group(&server, "Dev", &[&alice]).await;
    let id = created["id"].as_str().unwrap();

    let response = authorized(server.delete(&group_path(id))).await;
    response.assert_status(StatusCode::NO_CONTENT);

    authorized(server.get(&group_path(id)))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let attr = directory.get_user_attribute(&alice).await.unwrap();
    assert!(!attr.is_member_of(PROVIDER, "Ops"));
    assert!(attr.is_member_of(PROVIDER, "Dev"));

    // A group recreated under the same name starts empty.
    let recreated = create_group(&server, "Ops", &[]).await;
    assert!(member_ids(&recreated).is_empty());
}
