use axum::{middleware, routing::get, Router};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::auth;
use crate::config::AppConfig;
use crate::directory::{
    Directory, DirectoryResult, IdentityManager, InMemoryDirectory, ProviderSettings, Secret,
    SecretStore, User, UserAttribute,
};
use crate::logging;
use crate::resource;
use crate::utils::SCIM_ROUTE_PREFIX;

/// Shared handler state. Each collaborator is a trait object so the storage
/// engine can be swapped without touching handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub identities: Arc<dyn IdentityManager>,
    pub secrets: Arc<dyn SecretStore>,
    pub providers: Arc<dyn ProviderSettings>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// State where every collaborator is served by one in-memory directory.
    pub fn in_memory(directory: Arc<InMemoryDirectory>, config: AppConfig) -> Self {
        Self {
            directory: directory.clone(),
            identities: directory.clone(),
            secrets: directory.clone(),
            providers: directory,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let base_path = format!("{}/{{provider}}", SCIM_ROUTE_PREFIX);

    Router::new()
        .route(
            &format!("{}/ServiceProviderConfig", base_path),
            get(resource::service_provider::service_provider_config),
        )
        .route(
            &format!("{}/ResourceTypes", base_path),
            get(resource::resource_type::resource_types),
        )
        .route(
            &format!("{}/ResourceTypes/{{id}}", base_path),
            get(resource::resource_type::resource_type),
        )
        .route(
            &format!("{}/Schemas", base_path),
            get(resource::schema::schemas),
        )
        .route(
            &format!("{}/Schemas/{{id}}", base_path),
            get(resource::schema::schema),
        )
        .route(
            &format!("{}/Users", base_path),
            get(resource::user::list_users).post(resource::user::create_user),
        )
        .route(
            &format!("{}/Users/{{id}}", base_path),
            get(resource::user::get_user)
                .put(resource::user::update_user)
                .patch(resource::user::patch_user)
                .delete(resource::user::delete_user),
        )
        .route(
            &format!("{}/Groups", base_path),
            get(resource::group::list_groups).post(resource::group::create_group),
        )
        .route(
            &format!("{}/Groups/{{id}}", base_path),
            get(resource::group::get_group)
                .put(resource::group::update_group)
                .patch(resource::group::patch_group)
                .delete(resource::group::delete_group),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn(logging::logging_middleware))
        .with_state(state)
}

/// Seeds the in-memory directory with the default admin and the configured
/// bearer tokens.
pub fn bootstrap_directory(config: &AppConfig) -> DirectoryResult<Arc<InMemoryDirectory>> {
    let directory = Arc::new(InMemoryDirectory::new());

    for provider in &config.providers.disabled {
        directory.set_provider_disabled(provider, true);
    }

    let admin = directory.insert_user(User {
        name: format!("user-{}", config.bootstrap.admin_username),
        username: config.bootstrap.admin_username.clone(),
        principal_ids: vec![format!("local://{}", config.bootstrap.admin_username)],
        enabled: Some(true),
        system: false,
        default_admin: true,
        creation_timestamp: Utc::now(),
    })?;
    directory.insert_user_attribute(UserAttribute::new(&admin.name))?;
    info!("Seeded default admin user {}", admin.name);

    for token in &config.bootstrap.tokens {
        directory.insert_secret(Secret::scim_token(
            &config.auth.namespace,
            &token.provider,
            &token.token,
        ))?;
        info!("Seeded SCIM token for provider {}", token.provider);
    }

    Ok(directory)
}
