use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub const SCIM_SCHEMA_USER: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const SCIM_SCHEMA_GROUP: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const SCIM_SCHEMA_SERVICE_PROVIDER_CONFIG: &str =
    "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig";
pub const SCIM_SCHEMA_RESOURCE_TYPE: &str = "urn:ietf:params:scim:schemas:core:2.0:ResourceType";
pub const SCIM_SCHEMA_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Schema";
pub const SCIM_API_MESSAGES_LIST_RESPONSE: &str =
    "urn:ietf:params:scim:api:messages:2.0:ListResponse";
pub const SCIM_API_MESSAGES_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";
pub const SCIM_API_MESSAGES_PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";

pub const USER_RESOURCE: &str = "User";
pub const GROUP_RESOURCE: &str = "Group";
pub const USER_ENDPOINT: &str = "Users";
pub const GROUP_ENDPOINT: &str = "Groups";

/// Boolean that also accepts the strings "true"/"false".
///
/// Okta sends JSON booleans, Azure AD sends strings for flags such as the
/// primary email marker and `active` in PATCH values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScimBool(pub bool);

impl ScimBool {
    pub fn from_value(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_bool_str(s),
            _ => None,
        }
    }
}

fn parse_bool_str(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl<'de> Deserialize<'de> for ScimBool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ScimBool::from_value(&value)
            .map(ScimBool)
            .ok_or_else(|| de::Error::custom(format!("invalid boolean value: {}", value)))
    }
}

impl Serialize for ScimBool {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bool(self.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScimEmail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub primary: ScimBool,
}

/// Inbound SCIM User body (POST / PUT).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUserPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub schemas: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_id: String,
    #[serde(default)]
    pub active: Option<ScimBool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub emails: Vec<ScimEmail>,
}

impl ScimUserPayload {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|email| email.primary.0)
            .map(|email| email.value.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScimMember {
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
}

impl ScimMember {
    pub fn new(value: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: display.into(),
            member_type: None,
        }
    }
}

/// Inbound SCIM Group body (POST / PUT).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub schemas: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: Vec<ScimMember>,
}

/// Raw PATCH operation as it arrives on the wire; decoded further by
/// [`crate::parser::patch_parser`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScimPatchOperation {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScimPatchOp {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOperation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    pub resource_type: String,
    pub created: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUserResource {
    pub schemas: Vec<String>,
    pub id: String,
    pub user_name: String,
    pub external_id: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<ScimEmail>>,
    pub meta: ScimMeta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupResource {
    pub schemas: Vec<String>,
    pub id: String,
    pub display_name: String,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<ScimMember>>,
    pub meta: ScimMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScimListResponse<T> {
    pub schemas: Vec<String>,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: usize,
    #[serde(rename = "startIndex")]
    pub start_index: usize,
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    pub fn new(resources: Vec<T>, total_results: usize, start_index: usize) -> Self {
        Self {
            schemas: vec![SCIM_API_MESSAGES_LIST_RESPONSE.to_string()],
            total_results,
            items_per_page: resources.len(),
            start_index,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_email_accepts_string_flag() {
        let payload: ScimUserPayload = serde_json::from_value(json!({
            "userName": "jane.smith",
            "emails": [
                {"value": "jane@home.example", "primary": "false"},
                {"value": "jane@work.example", "primary": "True"}
            ]
        }))
        .unwrap();

        assert_eq!(payload.primary_email(), Some("jane@work.example"));
        assert!(payload.active.is_none());
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let result: Result<ScimEmail, _> =
            serde_json::from_value(json!({"value": "a@b.c", "primary": "yes"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_null_fields_read_as_empty() {
        let user: ScimUserPayload = serde_json::from_value(json!({
            "userName": "bob",
            "externalId": null,
            "emails": null,
            "active": null
        }))
        .unwrap();
        assert_eq!(user.external_id, "");
        assert!(user.emails.is_empty());
        assert!(user.active.is_none());

        let group: ScimGroupPayload = serde_json::from_value(json!({
            "displayName": "Eng",
            "externalId": null,
            "members": null,
            "schemas": null
        }))
        .unwrap();
        assert_eq!(group.display_name, "Eng");
        assert_eq!(group.external_id, "");
        assert!(group.members.is_empty());

        let member: ScimMember =
            serde_json::from_value(json!({"value": "u-1", "display": null})).unwrap();
        assert_eq!(member, ScimMember::new("u-1", ""));

        let email: ScimEmail =
            serde_json::from_value(json!({"value": "b@x.io", "primary": null})).unwrap();
        assert!(!email.primary.0);
    }

    #[test]
    fn test_member_type_is_optional() {
        let member: ScimMember = serde_json::from_value(json!({"value": "u-1"})).unwrap();
        assert_eq!(member, ScimMember::new("u-1", ""));

        let out = serde_json::to_value(ScimMember::new("u-1", "john")).unwrap();
        assert_eq!(out, json!({"value": "u-1", "display": "john"}));
    }
}
