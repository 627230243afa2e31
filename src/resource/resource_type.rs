use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Serialize;

use super::scim_response;
use crate::error::{AppError, AppResult};
use crate::models::{ScimListResponse, SCIM_SCHEMA_RESOURCE_TYPE};
use crate::schema::{find_resource_type, ResourceTypeDefinition, RESOURCE_TYPES};
use crate::startup::AppState;
use crate::utils::{request_base_url, resource_location};

const RESOURCE_TYPE_ENDPOINT: &str = "ResourceTypes";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceTypeMeta {
    resource_type: &'static str,
    location: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimResourceType {
    schemas: Vec<&'static str>,
    id: &'static str,
    name: &'static str,
    endpoint: String,
    description: &'static str,
    schema: &'static str,
    meta: ResourceTypeMeta,
}

fn resource_type_resource(
    definition: &ResourceTypeDefinition,
    provider: &str,
    base_url: &str,
) -> ScimResourceType {
    ScimResourceType {
        schemas: vec![SCIM_SCHEMA_RESOURCE_TYPE],
        id: definition.id,
        name: definition.name,
        endpoint: format!("/{}", definition.endpoint),
        description: definition.description,
        schema: definition.schema,
        meta: ResourceTypeMeta {
            resource_type: "ResourceType",
            location: resource_location(base_url, provider, RESOURCE_TYPE_ENDPOINT, definition.id),
        },
    }
}

pub async fn resource_types(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let base_url = request_base_url(&state.config.server, &headers);
    let resources: Vec<ScimResourceType> = RESOURCE_TYPES
        .iter()
        .map(|definition| resource_type_resource(definition, &provider, &base_url))
        .collect();
    let total = resources.len();

    Ok(scim_response(
        StatusCode::OK,
        &ScimListResponse::new(resources, total, 1),
    ))
}

pub async fn resource_type(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let definition = find_resource_type(&id)
        .ok_or_else(|| AppError::not_found(format!("ResourceType {} not found", id)))?;

    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &resource_type_resource(definition, &provider, &base_url),
    ))
}
