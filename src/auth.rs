use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::directory::{Secret, KIND_LABEL, PROVIDER_LABEL, SCIM_AUTH_TOKEN_KIND};
use crate::error::{AppError, AppResult};
use crate::startup::AppState;
use crate::utils::SCIM_ROUTE_PREFIX;

/// Provider that can never be provisioned through SCIM.
pub const LOCAL_PROVIDER: &str = "local";

/// Bearer token middleware for every SCIM route.
///
/// Unknown, local and disabled providers answer 404 so the existence of a
/// provider is not disclosed to unauthenticated callers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provider = provider_from_path(request.uri().path())
        .ok_or_else(|| AppError::not_found("Not found"))?
        .to_string();

    ensure_provider_enabled(&state, &provider).await?;

    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

    authenticate(&state, &provider, token).await?;

    Ok(next.run(request).await)
}

async fn ensure_provider_enabled(state: &AppState, provider: &str) -> AppResult<()> {
    if provider == LOCAL_PROVIDER {
        debug!("scim::auth: rejecting local provider");
        return Err(AppError::not_found("Not found"));
    }

    let disabled = state
        .providers
        .is_disabled_provider(provider)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::auth: failed to check provider {}: {}",
                provider, e
            ))
        })?;
    if disabled {
        debug!("scim::auth: provider {} is disabled", provider);
        return Err(AppError::not_found("Not found"));
    }

    Ok(())
}

async fn authenticate(state: &AppState, provider: &str, token: &str) -> AppResult<()> {
    let namespace = state.config.auth.namespace.as_str();
    let secrets = state
        .secrets
        .list_secrets(
            namespace,
            &[(KIND_LABEL, SCIM_AUTH_TOKEN_KIND), (PROVIDER_LABEL, provider)],
        )
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "scim::auth: failed to list tokens for {}: {}",
                provider, e
            ))
        })?;

    let ttl = token_ttl(state.config.auth.token_ttl_seconds);
    let scan = scan_tokens(&secrets, token, ttl, Utc::now());

    if !scan.expired.is_empty() {
        let store = state.secrets.clone();
        let namespace = namespace.to_string();
        let expired = scan.expired;
        tokio::spawn(async move {
            for name in expired {
                if let Err(e) = store.delete_secret(&namespace, &name).await {
                    warn!("scim::auth: failed to delete expired token {}: {}", name, e);
                }
            }
        });
    }

    if scan.matched {
        Ok(())
    } else {
        debug!("scim::auth: no matching token for provider {}", provider);
        Err(AppError::Unauthorized("Unauthorized".to_string()))
    }
}

/// Zero, or a TTL too large for a chrono `Duration`, never expires.
fn token_ttl(seconds: u64) -> Option<Duration> {
    if seconds == 0 {
        return None;
    }
    i64::try_from(seconds).ok().and_then(Duration::try_seconds)
}

#[derive(Debug, Default, PartialEq)]
struct TokenScan {
    matched: bool,
    /// Names of secrets older than the TTL.
    expired: Vec<String>,
}

/// Compares `token` against every live secret without short-circuiting.
fn scan_tokens(
    secrets: &[Secret],
    token: &str,
    ttl: Option<Duration>,
    now: DateTime<Utc>,
) -> TokenScan {
    let mut scan = TokenScan::default();

    for secret in secrets {
        if let Some(ttl) = ttl {
            if now - secret.creation_timestamp > ttl {
                scan.expired.push(secret.name.clone());
                continue;
            }
        }

        let Some(stored) = secret.token() else {
            continue;
        };
        let equal: bool = stored.as_bytes().ct_eq(token.as_bytes()).into();
        scan.matched |= equal;
    }

    scan
}

/// Path segment right after the SCIM route prefix.
fn provider_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(SCIM_ROUTE_PREFIX)?.strip_prefix('/')?;
    rest.split('/').next().filter(|segment| !segment.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}
