//! Decoding of SCIM PATCH bodies (RFC 7644 Section 3.5.2) into typed
//! operations.
//!
//! The raw `Operations` array is decoded once into [`PatchOperation`] and then
//! narrowed per resource: [`decode_user_replace`] for Users and
//! [`decode_group_operations`] for Groups. Handlers dispatch on the resulting
//! enums and never inspect JSON shapes themselves.

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{ScimBool, ScimMember, ScimPatchOp};

const PATH_ACTIVE: &str = "active";
const PATH_EXTERNAL_ID: &str = "externalid";
const PATH_PRIMARY_EMAIL: &str = "emails[primary eq true].value";
const PATH_ID: &str = "id";
const PATH_DISPLAY_NAME: &str = "displayname";
const PATH_MEMBERS: &str = "members";

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOperation {
    Replace { path: Option<String>, value: Value },
    Add { path: Option<String>, value: Value },
    Remove { path: Option<String>, value: Option<Value> },
}

/// Decodes every operation of a PATCH body, rejecting unknown ops.
pub fn decode_operations(patch: &ScimPatchOp) -> AppResult<Vec<PatchOperation>> {
    patch
        .operations
        .iter()
        .map(|op| {
            let path = op.path.as_deref().map(str::trim).filter(|p| !p.is_empty());
            let path = path.map(str::to_string);
            match op.op.to_lowercase().as_str() {
                "replace" => Ok(PatchOperation::Replace {
                    path,
                    value: required_value(&op.op, op.value.clone())?,
                }),
                "add" => Ok(PatchOperation::Add {
                    path,
                    value: required_value(&op.op, op.value.clone())?,
                }),
                "remove" => Ok(PatchOperation::Remove {
                    path,
                    value: op.value.clone(),
                }),
                _ => Err(AppError::bad_request(format!(
                    "Unsupported patch operation: {}",
                    op.op
                ))),
            }
        })
        .collect()
}

fn required_value(op: &str, value: Option<Value>) -> AppResult<Value> {
    value.ok_or_else(|| AppError::invalid_value(format!("Missing value for {} operation", op)))
}

fn string_value(path: &str, value: &Value) -> AppResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::invalid_value(format!("Invalid value for {}: {}", path, value)))
}

/// A single field replacement on a User.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReplace {
    Active(bool),
    ExternalId(String),
    PrimaryEmail(String),
}

/// Narrows a user `replace` to field replacements. An absent path means the
/// value is an object of fields, each decoded as if it were its own path.
pub fn decode_user_replace(path: Option<&str>, value: &Value) -> AppResult<Vec<UserReplace>> {
    let Some(path) = path else {
        let fields = value.as_object().ok_or_else(|| {
            AppError::invalid_value(format!("Invalid value type for replace operation: {}", value))
        })?;
        let mut replacements = Vec::with_capacity(fields.len());
        for (name, field_value) in fields {
            replacements.extend(decode_user_replace(Some(name), field_value)?);
        }
        return Ok(replacements);
    };

    match path.to_lowercase().as_str() {
        PATH_ACTIVE => ScimBool::from_value(value)
            .map(|active| vec![UserReplace::Active(active)])
            .ok_or_else(|| AppError::invalid_value(format!("Invalid value for active: {}", value))),
        PATH_EXTERNAL_ID => Ok(vec![UserReplace::ExternalId(string_value(path, value)?)]),
        PATH_PRIMARY_EMAIL => Ok(vec![UserReplace::PrimaryEmail(string_value(path, value)?)]),
        _ => Err(AppError::invalid_path(format!(
            "Unsupported patch path: {}",
            path
        ))),
    }
}

/// A single field replacement on a Group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupReplace {
    ExternalId(String),
    /// Only accepted when equal to the current value.
    Id(String),
    /// Only accepted when equal to the current value; displayName is the
    /// group's natural key.
    DisplayName(String),
}

/// Group PATCH operations in the order they must be applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPatch {
    pub replacements: Vec<GroupReplace>,
    pub members_to_add: Vec<ScimMember>,
    pub members_to_remove: Vec<String>,
}

pub fn decode_group_operations(operations: Vec<PatchOperation>) -> AppResult<GroupPatch> {
    let mut patch = GroupPatch::default();

    for operation in operations {
        match operation {
            PatchOperation::Replace { path, value } => {
                patch
                    .replacements
                    .extend(decode_group_replace(path.as_deref(), &value)?);
            }
            PatchOperation::Add { path, value } => {
                let path = path.unwrap_or_default();
                if !path.eq_ignore_ascii_case(PATH_MEMBERS) {
                    return Err(AppError::invalid_path(format!(
                        "Unsupported add path: {}",
                        path
                    )));
                }
                patch.members_to_add.extend(decode_members(&value)?);
            }
            PatchOperation::Remove { path, value } => {
                let path = path.unwrap_or_default();
                let lowered = path.to_lowercase();
                if lowered == PATH_MEMBERS {
                    // Azure AD form: path "members" with the member list as value.
                    let value = value.ok_or_else(|| {
                        AppError::invalid_value("Missing members value for remove operation")
                    })?;
                    patch
                        .members_to_remove
                        .extend(decode_members(&value)?.into_iter().map(|m| m.value));
                } else if lowered.starts_with("members[") {
                    let user_id = extract_member_value_from_path(&path)
                        .filter(|value| !value.is_empty())
                        .ok_or_else(|| {
                            AppError::invalid_path("Invalid member removal path format")
                        })?;
                    patch.members_to_remove.push(user_id);
                } else {
                    return Err(AppError::invalid_path(format!(
                        "Unsupported remove path: {}",
                        path
                    )));
                }
            }
        }
    }

    Ok(patch)
}

fn decode_group_replace(path: Option<&str>, value: &Value) -> AppResult<Vec<GroupReplace>> {
    let Some(path) = path else {
        let fields = value.as_object().ok_or_else(|| {
            AppError::invalid_value(format!("Invalid value type for replace operation: {}", value))
        })?;
        let mut replacements = Vec::with_capacity(fields.len());
        for (name, field_value) in fields {
            replacements.extend(decode_group_replace(Some(name), field_value)?);
        }
        return Ok(replacements);
    };

    match path.to_lowercase().as_str() {
        PATH_EXTERNAL_ID => Ok(vec![GroupReplace::ExternalId(string_value(path, value)?)]),
        PATH_ID => Ok(vec![GroupReplace::Id(string_value(path, value)?)]),
        PATH_DISPLAY_NAME => Ok(vec![GroupReplace::DisplayName(string_value(path, value)?)]),
        _ => Err(AppError::invalid_path(format!(
            "Unsupported patch path: {}",
            path
        ))),
    }
}

/// Decodes an array of `{value, type, display}` member objects.
pub fn decode_members(value: &Value) -> AppResult<Vec<ScimMember>> {
    let items = value
        .as_array()
        .ok_or_else(|| AppError::invalid_value("Invalid members value: expected an array"))?;

    items
        .iter()
        .map(|item| {
            let member: ScimMember = serde_json::from_value(item.clone())
                .map_err(|e| AppError::invalid_value(format!("Invalid member: {}", e)))?;
            if member.value.is_empty() {
                return Err(AppError::invalid_value("Member value must not be empty"));
            }
            Ok(member)
        })
        .collect()
}

/// Extracts the quoted literal from a path like `members[value eq "u-123"]`.
pub fn extract_member_value_from_path(path: &str) -> Option<String> {
    let start = path.find('"')?;
    let end = path.rfind('"')?;
    if end <= start {
        return None;
    }
    Some(path[start + 1..end].to_string())
}
