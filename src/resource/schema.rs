use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde_json::{json, Value};

use super::scim_response;
use crate::error::{AppError, AppResult};
use crate::models::{ScimListResponse, SCIM_SCHEMA_SCHEMA};
use crate::schema::{find_schema, get_all_schemas, AttributeDefinition, SchemaDefinition};
use crate::startup::AppState;
use crate::utils::{request_base_url, resource_location};

const SCHEMA_ENDPOINT: &str = "Schemas";

fn build_attribute_json(attr: &AttributeDefinition) -> Value {
    let mut attr_json = json!({
        "name": attr.name,
        "type": attr.attr_type,
        "multiValued": attr.multi_valued,
        "description": attr.description,
        "required": attr.required,
        "caseExact": attr.case_exact,
        "mutability": attr.mutability,
        "returned": attr.returned,
        "uniqueness": attr.uniqueness,
    });

    if !attr.sub_attributes.is_empty() {
        let sub_attrs: Vec<Value> = attr
            .sub_attributes
            .iter()
            .map(build_attribute_json)
            .collect();
        attr_json["subAttributes"] = json!(sub_attrs);
    }
    if !attr.canonical_values.is_empty() {
        attr_json["canonicalValues"] = json!(attr.canonical_values);
    }
    if !attr.reference_types.is_empty() {
        attr_json["referenceTypes"] = json!(attr.reference_types);
    }

    attr_json
}

fn build_schema_json(schema: &SchemaDefinition, provider: &str, base_url: &str) -> Value {
    let attributes: Vec<Value> = schema.attributes.iter().map(build_attribute_json).collect();

    json!({
        "schemas": [SCIM_SCHEMA_SCHEMA],
        "id": schema.id,
        "name": schema.name,
        "description": schema.description,
        "attributes": attributes,
        "meta": {
            "resourceType": "Schema",
            "location": resource_location(base_url, provider, SCHEMA_ENDPOINT, schema.id),
        }
    })
}

pub async fn schemas(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let base_url = request_base_url(&state.config.server, &headers);
    let resources: Vec<Value> = get_all_schemas()
        .into_iter()
        .map(|schema| build_schema_json(schema, &provider, &base_url))
        .collect();
    let total = resources.len();

    Ok(scim_response(
        StatusCode::OK,
        &ScimListResponse::new(resources, total, 1),
    ))
}

pub async fn schema(
    State(state): State<AppState>,
    Path((provider, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let schema =
        find_schema(&id).ok_or_else(|| AppError::not_found(format!("Schema {} not found", id)))?;

    let base_url = request_base_url(&state.config.server, &headers);
    Ok(scim_response(
        StatusCode::OK,
        &build_schema_json(schema, &provider, &base_url),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::USER_SCHEMA;

    #[test]
    fn test_attribute_json_uses_scim_keywords() {
        let json = build_schema_json(&USER_SCHEMA, "okta", "http://localhost");
        let attributes = json["attributes"].as_array().unwrap();

        let id = &attributes[0];
        assert_eq!(id["name"], "id");
        assert_eq!(id["mutability"], "readOnly");
        assert_eq!(id["returned"], "always");
        assert_eq!(id["uniqueness"], "server");

        let emails = attributes.iter().find(|a| a["name"] == "emails").unwrap();
        assert_eq!(emails["type"], "complex");
        assert_eq!(emails["multiValued"], true);
        assert_eq!(emails["subAttributes"].as_array().unwrap().len(), 2);

        assert_eq!(
            json["meta"]["location"],
            "http://localhost/v1-scim/okta/Schemas/urn:ietf:params:scim:schemas:core:2.0:User"
        );
    }
}
