use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::Response,
};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::membership::{
    add_group_member, get_all_group_members, get_group_members, remove_all_group_members,
    remove_group_member, sync_group_members, validate_members,
};
use super::{created_response, equality_filter, excludes_members, no_content, scim_response};
use crate::directory::Group;
use crate::error::{AppError, AppResult};
use crate::extractors::ScimJson;
use crate::models::{
    ScimGroupPayload, ScimGroupResource, ScimListResponse, ScimMember, ScimMeta, ScimPatchOp,
    GROUP_ENDPOINT, GROUP_RESOURCE, SCIM_SCHEMA_GROUP,
};
use crate::pagination::{paginate, PaginationParams};
use crate::parser::filter_parser::FilterMatch;
use crate::parser::patch_parser::{decode_group_operations, decode_operations};
use crate::parser::GroupReplace;
use crate::startup::AppState;
use crate::utils::{eq_fold, format_scim_datetime, request_base_url, resource_location};

fn group_resource(
    group: &Group,
    members: Option<Vec<ScimMember>>,
    provider: &str,
    base_url: &str,
) -> ScimGroupResource {
    ScimGroupResource {
        schemas: vec![SCIM_SCHEMA_GROUP.to_string()],
        id: group.name.clone(),
        display_name: group.display_name.clone(),
        external_id: group.external_id.clone(),
        members,
        meta: ScimMeta {
            resource_type: GROUP_RESOURCE.to_string(),
            created: format_scim_datetime(group.creation_timestamp),
            location: resource_location(base_url, provider, GROUP_ENDPOINT, &group.name),
        },
    }
}

/// Fetches a group of `provider` by ID; groups of other providers are 404.
async fn get_provider_group(state: &AppState, provider: &str, id: &str) -> AppResult<Group> {
    let group = match state.directory.get_group(id).await {
        Ok(group) => group,
        Err(e) if e.is_not_found() => {
            return Err(AppError::not_found(format!("Group {} not found", id)))
        }
        Err(e) => return Err(AppError::internal(format!("failed to get group {}: {}", id, e))),
    };

    if group.provider != provider {
        return Err(AppError::not_found(format!("Group {} not found", id)));
    }
    Ok(group)
}

async fn current_members(
    state: &AppState,
    provider: &str,
    group: &Group,
) -> AppResult<Vec<ScimMember>> {
    get_group_members(state.directory.as_ref(), provider, &group.display_name)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "failed to get members of group {}: {}",
                group.name, e
            ))
        })
}

/// Finds or creates the group described by `payload`.
///
/// With an ID the group must exist. Otherwise the group is looked up by
/// case-insensitive displayName; a match has its externalId refreshed and is
/// returned with `created == false`.
pub async fn ensure_group(
    state: &AppState,
    provider: &str,
    payload: &ScimGroupPayload,
) -> AppResult<(Group, bool)> {
    if !payload.id.is_empty() {
        let group = get_provider_group(state, provider, &payload.id).await?;
        return Ok((group, false));
    }

    let groups = state.directory.list_groups(provider).await.map_err(|e| {
        AppError::internal(format!(
            "failed to list groups for provider {}: {}",
            provider, e
        ))
    })?;

    if let Some(existing) = groups
        .into_iter()
        .find(|group| eq_fold(&group.display_name, &payload.display_name))
    {
        if existing.external_id == payload.external_id {
            return Ok((existing, false));
        }
        let mut group = existing;
        group.external_id = payload.external_id.clone();
        let updated = state.directory.update_group(&group).await.map_err(|e| {
            AppError::internal(format!("failed to update group {}: {}", group.name, e))
        })?;
        return Ok((updated, false));
    }

    let group = Group::new_for_provider(provider, &payload.display_name, &payload.external_id);
    let created = state
        .directory
        .create_group(&group)
        .await
        .map_err(|e| AppError::internal(format!("failed to create group: {}", e)))?;
    Ok((created, true))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    uri: Uri,
) -> AppResult<Response> {
    trace!("scim::list_groups: url {}", uri);

    let pagination = PaginationParams::from_query(&params)?;
    let filter = equality_filter(&params, "displayName")?;
    let exclude_members = excludes_members(&params);

    debug!(
        "scim::list_groups: displayName={:?}, startIndex={}, count={:?}",
        filter.as_ref().and_then(|f| f.value.as_deref()),
        pagination.start_index,
        pagination.count
    );

    let mut groups = state.directory.list_groups(&provider).await.map_err(|e| {
        AppError::internal(format!(
            "scim::list_groups: failed to list groups for provider {}: {}",
            provider, e
        ))
    })?;
    groups.sort_by(|a, b| a.name.cmp(&b.name));

    let mut all_members = if groups.is_empty() || exclude_members {
        HashMap::new()
    } else {
        get_all_group_members(state.directory.as_ref(), &provider)
            .await
            .map_err(|e| AppError::internal(format!("scim::list_groups: {}", e)))?
    };

    let base_url = request_base_url(&state.config.server, &headers);
    let resources: Vec<ScimGroupResource> = groups
        .iter()
        .filter(|group| filter.matches(&group.display_name))
        .map(|group| {
            let members = (!exclude_members)
                .then(|| all_members.remove(&group.display_name).unwrap_or_default());
            group_resource(group, members, &provider, &base_url)
        })
        .collect();

    let total_results = resources.len();
    let (page, start_index) = paginate(resources, &pagination);

    Ok(scim_response(
        StatusCode::OK,
        &ScimListResponse::new(page, total_results, start_index),
    ))
}

pub async fn create_group(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<ScimGroupPayload>,
) -> AppResult<Response> {
    trace!("scim::create_group: request body: {:?}", payload);

    if payload.display_name.trim().is_empty() {
        return Err(AppError::invalid_value("displayName is required"));
    }
    validate_members(state.directory.as_ref(), &payload.members).await?;

    let payload = ScimGroupPayload {
        id: String::new(),
        ..payload
    };
    let (group, created) = ensure_group(&state, &provider, &payload).await?;
    if !created {
        return Err(AppError::uniqueness(format!(
            "Group with displayName {:?} already exists",
            payload.display_name
        )));
    }

    if !payload.members.is_empty() {
        sync_group_members(
            state.directory.as_ref(),
            &provider,
            &group.display_name,
            &payload.members,
        )
        .await?;
    }

    let members = current_members(&state, &provider, &group).await?;
    let base_url = request_base_url(&state.config.server, &headers);
    let resource = group_resource(&group, Some(members), &provider, &base_url);
    created_response(&resource.meta.location, &resource)
}

pub async fn get_group(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    trace!("scim::get_group: id {}", id);

    let group = get_provider_group(&state, &provider, &id).await?;
    let members = if excludes_members(&params) {
        None
    } else {
        Some(current_members(&state, &provider, &group).await?)
    };

    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &group_resource(&group, members, &provider, &base_url),
    ))
}

/// Replaces externalId and membership. displayName is the group's natural
/// key and is left as stored.
pub async fn update_group(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<ScimGroupPayload>,
) -> AppResult<Response> {
    trace!("scim::update_group: request body: {:?}", payload);

    if !payload.id.is_empty() && payload.id != id {
        debug!(
            "scim::update_group: id in URL {} does not match id in body {}",
            id, payload.id
        );
        return Err(AppError::bad_request("Mismatched Group id"));
    }
    validate_members(state.directory.as_ref(), &payload.members).await?;

    let payload = ScimGroupPayload { id, ..payload };
    let (mut group, _) = ensure_group(&state, &provider, &payload).await?;

    if group.external_id != payload.external_id {
        group.external_id = payload.external_id.clone();
        group = state.directory.update_group(&group).await.map_err(|e| {
            AppError::internal(format!(
                "scim::update_group: failed to update group {}: {}",
                group.name, e
            ))
        })?;
    }

    sync_group_members(
        state.directory.as_ref(),
        &provider,
        &group.display_name,
        &payload.members,
    )
    .await?;

    let members = current_members(&state, &provider, &group).await?;
    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &group_resource(&group, Some(members), &provider, &base_url),
    ))
}

/// Applies field replacements, then member additions, then removals.
pub async fn patch_group(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<ScimPatchOp>,
) -> AppResult<Response> {
    trace!("scim::patch_group: request body: {:?}", payload);

    let mut group = get_provider_group(&state, &provider, &id).await?;
    let patch = decode_group_operations(decode_operations(&payload)?)?;

    let mut update_group = false;
    for replacement in patch.replacements {
        match replacement {
            GroupReplace::ExternalId(external_id) => {
                if group.external_id != external_id {
                    group.external_id = external_id;
                    update_group = true;
                }
            }
            GroupReplace::Id(value) if value == group.name => {}
            GroupReplace::Id(_) => return Err(AppError::mutability("id cannot be changed")),
            GroupReplace::DisplayName(value) if value == group.display_name => {}
            GroupReplace::DisplayName(_) => {
                return Err(AppError::mutability("displayName cannot be changed"))
            }
        }
    }

    validate_members(state.directory.as_ref(), &patch.members_to_add).await?;

    if update_group {
        group = state.directory.update_group(&group).await.map_err(|e| {
            AppError::internal(format!(
                "scim::patch_group: failed to update group {}: {}",
                group.name, e
            ))
        })?;
    }

    for member in &patch.members_to_add {
        add_group_member(
            state.directory.as_ref(),
            &provider,
            &group.display_name,
            &member.value,
        )
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::patch_group: failed to add member {}: {}",
                member.value, e
            ))
        })?;
    }

    for user_id in &patch.members_to_remove {
        remove_group_member(
            state.directory.as_ref(),
            &provider,
            &group.display_name,
            user_id,
        )
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::patch_group: failed to remove member {}: {}",
                user_id, e
            ))
        })?;
    }

    let members = current_members(&state, &provider, &group).await?;
    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &group_resource(&group, Some(members), &provider, &base_url),
    ))
}

/// Strips every membership, then deletes the group.
pub async fn delete_group(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
) -> AppResult<Response> {
    trace!("scim::delete_group: id {}", id);

    let group = get_provider_group(&state, &provider, &id).await?;

    remove_all_group_members(state.directory.as_ref(), &provider, &group.display_name)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::delete_group: failed to remove members of {}: {}",
                group.name, e
            ))
        })?;

    state.directory.delete_group(&group.name).await.map_err(|e| {
        AppError::internal(format!(
            "scim::delete_group: failed to delete group {}: {}",
            group.name, e
        ))
    })?;

    Ok(no_content())
}
