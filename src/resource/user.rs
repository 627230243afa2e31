use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::Response,
};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::{created_response, equality_filter, no_content, scim_response};
use crate::directory::{DirectoryResult, User, UserAttribute};
use crate::error::{AppError, AppResult};
use crate::extractors::ScimJson;
use crate::models::{
    ScimBool, ScimEmail, ScimListResponse, ScimMeta, ScimPatchOp, ScimUserPayload,
    ScimUserResource, SCIM_SCHEMA_USER, USER_ENDPOINT, USER_RESOURCE,
};
use crate::pagination::{paginate, PaginationParams};
use crate::parser::filter_parser::FilterMatch;
use crate::parser::patch_parser::{decode_operations, decode_user_replace};
use crate::parser::{PatchOperation, UserReplace};
use crate::startup::AppState;
use crate::utils::{eq_fold, format_scim_datetime, request_base_url, resource_location};

const EXTRA_USERNAME: &str = "username";
const EXTRA_EXTERNAL_ID: &str = "externalid";
const EXTRA_PRINCIPAL_ID: &str = "principalid";
const EXTRA_EMAIL: &str = "email";

fn user_resource(
    user: &User,
    attr: &UserAttribute,
    provider: &str,
    base_url: &str,
) -> ScimUserResource {
    let email = attr.extra(provider, EXTRA_EMAIL);
    ScimUserResource {
        schemas: vec![SCIM_SCHEMA_USER.to_string()],
        id: user.name.clone(),
        user_name: attr.extra(provider, EXTRA_USERNAME).to_string(),
        external_id: attr.extra(provider, EXTRA_EXTERNAL_ID).to_string(),
        active: user.is_active(),
        emails: (!email.is_empty()).then(|| {
            vec![ScimEmail {
                value: email.to_string(),
                primary: ScimBool(true),
            }]
        }),
        meta: ScimMeta {
            resource_type: USER_RESOURCE.to_string(),
            created: format_scim_datetime(user.creation_timestamp),
            location: resource_location(base_url, provider, USER_ENDPOINT, &user.name),
        },
    }
}

/// Fetches a user visible to SCIM: missing and system users are both 404.
async fn get_scim_user(state: &AppState, id: &str) -> AppResult<User> {
    let user = match state.directory.get_user(id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            return Err(AppError::not_found(format!("User {} not found", id)))
        }
        Err(e) => return Err(AppError::internal(format!("failed to get user {}: {}", id, e))),
    };

    if user.is_system() {
        return Err(AppError::not_found(format!("User {} not found", id)));
    }
    Ok(user)
}

/// The user's attribute record and whether it already exists.
async fn get_attribute(state: &AppState, user_id: &str) -> AppResult<(UserAttribute, bool)> {
    match state.directory.get_user_attribute(user_id).await {
        Ok(attr) => Ok((attr, true)),
        Err(e) if e.is_not_found() => Ok((UserAttribute::new(user_id), false)),
        Err(e) => Err(AppError::internal(format!(
            "failed to get user attributes for {}: {}",
            user_id, e
        ))),
    }
}

async fn store_attribute(
    state: &AppState,
    provider: &str,
    attr: &UserAttribute,
    exists: bool,
) -> DirectoryResult<()> {
    if exists {
        state.directory.update_user_attribute(attr).await?;
        return Ok(());
    }
    state
        .identities
        .user_attribute_create_or_update(
            &attr.name,
            provider,
            attr.groups(provider).to_vec(),
            attr.extra_by_provider
                .get(provider)
                .cloned()
                .unwrap_or_default(),
        )
        .await
}

/// Applies a new `active` value to `user`, refusing to deprovision the
/// default admin. Returns whether the user changed.
fn apply_active(user: &mut User, active: bool) -> AppResult<bool> {
    if user.is_active() == active {
        return Ok(false);
    }
    if user.is_default_admin() && !active {
        return Err(AppError::conflict("Cannot deprovision default admin user"));
    }
    user.enabled = Some(active);
    Ok(true)
}

/// Sets a provider extra. Returns whether the stored value changed.
fn apply_extra(attr: &mut UserAttribute, provider: &str, key: &str, value: &str) -> bool {
    if attr.extra(provider, key) == value {
        return false;
    }
    attr.set_extra(provider, key, value);
    true
}

pub async fn list_users(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    uri: Uri,
) -> AppResult<Response> {
    trace!("scim::list_users: url {}", uri);

    let pagination = PaginationParams::from_query(&params)?;
    let filter = equality_filter(&params, "userName")?;

    debug!(
        "scim::list_users: filter={:?}, startIndex={}, count={:?}",
        filter.as_ref().and_then(|f| f.value.as_deref()),
        pagination.start_index,
        pagination.count
    );

    let mut users = state
        .directory
        .list_users()
        .await
        .map_err(|e| AppError::internal(format!("scim::list_users: failed to list users: {}", e)))?;
    // Stable order across paging requests.
    users.sort_by(|a, b| a.name.cmp(&b.name));

    let base_url = request_base_url(&state.config.server, &headers);
    let mut resources = Vec::new();
    for user in users.iter().filter(|user| !user.is_system()) {
        let attr = match state.directory.get_user_attribute(&user.name).await {
            Ok(attr) => attr,
            Err(e) if e.is_not_found() => continue,
            Err(e) => {
                return Err(AppError::internal(format!(
                    "scim::list_users: failed to get user attributes for {}: {}",
                    user.name, e
                )))
            }
        };

        if attr.extra(&provider, EXTRA_PRINCIPAL_ID).is_empty() {
            continue;
        }
        if !filter.matches(attr.extra(&provider, EXTRA_USERNAME)) {
            continue;
        }

        resources.push(user_resource(user, &attr, &provider, &base_url));
    }

    let total_results = resources.len();
    let (page, start_index) = paginate(resources, &pagination);

    Ok(scim_response(
        StatusCode::OK,
        &ScimListResponse::new(page, total_results, start_index),
    ))
}

pub async fn create_user(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<ScimUserPayload>,
) -> AppResult<Response> {
    trace!("scim::create_user: request body: {:?}", payload);

    if payload.user_name.is_empty() {
        return Err(AppError::invalid_value("userName is required"));
    }

    let users = state
        .directory
        .list_users()
        .await
        .map_err(|e| AppError::internal(format!("scim::create_user: failed to list users: {}", e)))?;
    for user in &users {
        let attr = match state.directory.get_user_attribute(&user.name).await {
            Ok(attr) => attr,
            Err(e) if e.is_not_found() => continue,
            Err(e) => {
                return Err(AppError::internal(format!(
                    "scim::create_user: failed to get user attributes for {}: {}",
                    user.name, e
                )))
            }
        };
        if eq_fold(attr.extra(&provider, EXTRA_USERNAME), &payload.user_name) {
            return Err(AppError::uniqueness(format!(
                "User with username {} already exists",
                payload.user_name
            )));
        }
    }

    let principal_name = format!("{}_user://{}", provider, payload.user_name);
    let user = state
        .identities
        .ensure_user(&principal_name, &payload.user_name)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::create_user: failed to ensure user {}: {}",
                principal_name, e
            ))
        })?;

    let mut extras = HashMap::new();
    extras.insert(EXTRA_USERNAME.to_string(), vec![payload.user_name.clone()]);
    extras.insert(
        EXTRA_EXTERNAL_ID.to_string(),
        vec![payload.external_id.clone()],
    );
    extras.insert(EXTRA_PRINCIPAL_ID.to_string(), vec![principal_name]);
    if let Some(email) = payload.primary_email() {
        extras.insert(EXTRA_EMAIL.to_string(), vec![email.to_string()]);
    }

    let mut attr = UserAttribute::new(&user.name);
    attr.extra_by_provider.insert(provider.clone(), extras.clone());

    state
        .identities
        .user_attribute_create_or_update(&user.name, &provider, Vec::new(), extras)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::create_user: failed to ensure user attributes for {}: {}",
                user.name, e
            ))
        })?;

    let base_url = request_base_url(&state.config.server, &headers);
    let resource = user_resource(&user, &attr, &provider, &base_url);
    created_response(&resource.meta.location, &resource)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<Response> {
    trace!("scim::get_user: id {}", id);

    let user = get_scim_user(&state, &id).await?;
    let (attr, _) = get_attribute(&state, &user.name).await?;

    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &user_resource(&user, &attr, &provider, &base_url),
    ))
}

/// Full replace of userName, externalId, active and the primary email.
/// An absent `active` leaves the flag unchanged.
pub async fn update_user(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<ScimUserPayload>,
) -> AppResult<Response> {
    trace!("scim::update_user: request body: {:?}", payload);

    if payload.user_name.is_empty() {
        return Err(AppError::invalid_value("userName is required"));
    }

    let mut user = get_scim_user(&state, &id).await?;
    let (mut attr, attr_exists) = get_attribute(&state, &user.name).await?;

    let mut update_attr = false;
    update_attr |= apply_extra(&mut attr, &provider, EXTRA_USERNAME, &payload.user_name);
    update_attr |= apply_extra(&mut attr, &provider, EXTRA_EXTERNAL_ID, &payload.external_id);
    match payload.primary_email() {
        Some(email) => update_attr |= apply_extra(&mut attr, &provider, EXTRA_EMAIL, email),
        None => update_attr |= attr.remove_extra(&provider, EXTRA_EMAIL),
    }

    let update_user = match payload.active {
        Some(ScimBool(active)) => apply_active(&mut user, active)?,
        None => false,
    };

    persist(&state, &provider, &user, update_user, &attr, attr_exists, update_attr).await?;

    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &user_resource(&user, &attr, &provider, &base_url),
    ))
}

/// Supports `replace` on `active`, `externalId` and
/// `emails[primary eq true].value`, plus the path-less bulk form.
pub async fn patch_user(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<ScimPatchOp>,
) -> AppResult<Response> {
    trace!("scim::patch_user: request body: {:?}", payload);

    let mut user = get_scim_user(&state, &id).await?;
    let (mut attr, attr_exists) = get_attribute(&state, &user.name).await?;

    let mut update_attr = false;
    let mut update_user = false;
    for operation in decode_operations(&payload)? {
        let (path, value) = match operation {
            PatchOperation::Replace { path, value } => (path, value),
            PatchOperation::Add { .. } => return Err(unsupported_operation("add")),
            PatchOperation::Remove { .. } => return Err(unsupported_operation("remove")),
        };

        for replacement in decode_user_replace(path.as_deref(), &value)? {
            match replacement {
                UserReplace::Active(active) => update_user |= apply_active(&mut user, active)?,
                UserReplace::ExternalId(external_id) => {
                    update_attr |= apply_extra(&mut attr, &provider, EXTRA_EXTERNAL_ID, &external_id)
                }
                UserReplace::PrimaryEmail(email) => {
                    update_attr |= apply_extra(&mut attr, &provider, EXTRA_EMAIL, &email)
                }
            }
        }
    }

    persist(&state, &provider, &user, update_user, &attr, attr_exists, update_attr).await?;

    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &user_resource(&user, &attr, &provider, &base_url),
    ))
}

fn unsupported_operation(op: &str) -> AppError {
    AppError::bad_request(format!("Unsupported patch operation: {}", op))
}

/// Writes the attribute record first, then the user.
async fn persist(
    state: &AppState,
    provider: &str,
    user: &User,
    update_user: bool,
    attr: &UserAttribute,
    attr_exists: bool,
    update_attr: bool,
) -> AppResult<()> {
    if update_attr {
        store_attribute(state, provider, attr, attr_exists)
            .await
            .map_err(|e| {
                AppError::internal(format!(
                    "failed to update user attributes for {}: {}",
                    user.name, e
                ))
            })?;
    }
    if update_user {
        state
            .directory
            .update_user(user)
            .await
            .map_err(|e| AppError::internal(format!("failed to update user {}: {}", user.name, e)))?;
    }
    Ok(())
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path((_provider, id)): Path<(String, String)>,
) -> AppResult<Response> {
    trace!("scim::delete_user: id {}", id);

    let user = get_scim_user(&state, &id).await?;
    if user.is_default_admin() {
        return Err(AppError::conflict("Cannot delete default admin user"));
    }

    state.directory.delete_user(&user.name).await.map_err(|e| {
        AppError::internal(format!(
            "scim::delete_user: failed to delete user {}: {}",
            user.name, e
        ))
    })?;

    Ok(no_content())
}
