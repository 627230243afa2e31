use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::SCIM_CONTENT_TYPE;
use crate::parser::{parse_filter, Filter, FilterOperator};

pub mod group;
pub mod membership;
pub mod resource_type;
pub mod schema;
pub mod service_provider;
pub mod user;

/// Serializes `body` with the SCIM media type.
pub fn scim_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(SCIM_CONTENT_TYPE),
    );
    response
}

/// 201 response carrying a `Location` header.
pub fn created_response<T: Serialize>(location: &str, body: &T) -> AppResult<Response> {
    let mut response = scim_response(StatusCode::CREATED, body);
    let location = HeaderValue::from_str(location)
        .map_err(|e| AppError::internal(format!("invalid location header {}: {}", location, e)))?;
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Parses the `filter` query parameter and restricts it to
/// `<attribute> eq "<value>"`.
pub fn equality_filter(
    params: &HashMap<String, String>,
    attribute: &str,
) -> AppResult<Option<Filter>> {
    let Some(raw) = params.get("filter").filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    let filter = parse_filter(raw)?;
    filter.validate_for_attribute(attribute, &[FilterOperator::Equal])?;
    Ok(Some(filter))
}

/// True when `excludedAttributes` names `members`.
pub fn excludes_members(params: &HashMap<String, String>) -> bool {
    params
        .get("excludedAttributes")
        .map(|value| {
            value
                .split(',')
                .any(|field| field.trim().eq_ignore_ascii_case("members"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equality_filter_allow_list() {
        assert!(equality_filter(&query(&[]), "userName").unwrap().is_none());

        let filter = equality_filter(&query(&[("filter", "userName eq \"jane\"")]), "userName")
            .unwrap()
            .unwrap();
        assert_eq!(filter.value.as_deref(), Some("jane"));

        assert!(equality_filter(&query(&[("filter", "userName sw \"j\"")]), "userName").is_err());
        assert!(equality_filter(&query(&[("filter", "emails pr")]), "userName").is_err());
    }

    #[test]
    fn test_excludes_members() {
        assert!(excludes_members(&query(&[("excludedAttributes", "members")])));
        assert!(excludes_members(&query(&[("excludedAttributes", "externalId, members")])));
        assert!(!excludes_members(&query(&[("excludedAttributes", "externalId")])));
        assert!(!excludes_members(&query(&[])));
    }
}
