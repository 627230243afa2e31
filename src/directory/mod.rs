//! Collaborator interfaces consumed by the SCIM handlers.
//!
//! The storage engine, the identity manager that mints user records, the
//! bearer-token secret store and provider enablement all live outside this
//! crate. Handlers only see the traits below; [`memory::InMemoryDirectory`]
//! implements every one of them for the bundled binary and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryDirectory;

/// Label carrying the provider name on groups and token secrets.
pub const PROVIDER_LABEL: &str = "provider";
/// Label identifying the kind of a secret.
pub const KIND_LABEL: &str = "kind";
/// Value of [`KIND_LABEL`] for SCIM bearer tokens.
pub const SCIM_AUTH_TOKEN_KIND: &str = "scim-auth-token";
/// Key of the token value inside a secret's data.
pub const TOKEN_DATA_KEY: &str = "token";

pub const PRINCIPAL_TYPE_GROUP: &str = "group";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        DirectoryError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Internal, immutable identifier.
    pub name: String,
    pub username: String,
    pub principal_ids: Vec<String>,
    /// `None` means enabled.
    pub enabled: Option<bool>,
    pub system: bool,
    pub default_admin: bool,
    pub creation_timestamp: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn is_default_admin(&self) -> bool {
        self.default_admin
    }
}

/// Reference to an external identity attached to a user's attribute record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub display_name: String,
    pub provider: String,
    pub principal_type: String,
    pub member_of: bool,
}

impl Principal {
    pub fn group(provider: &str, display_name: &str) -> Self {
        Self {
            name: format!("{}_group://{}", provider, display_name),
            display_name: display_name.to_string(),
            provider: provider.to_string(),
            principal_type: PRINCIPAL_TYPE_GROUP.to_string(),
            member_of: true,
        }
    }
}

/// Per-user record holding provider-scoped extras and group principals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAttribute {
    /// Same as the owning user's name.
    pub name: String,
    pub group_principals: HashMap<String, Vec<Principal>>,
    pub extra_by_provider: HashMap<String, HashMap<String, Vec<String>>>,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First value of a provider-scoped extra, or "" when absent.
    pub fn extra(&self, provider: &str, key: &str) -> &str {
        self.extra_by_provider
            .get(provider)
            .and_then(|extras| extras.get(key))
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_extra(&mut self, provider: &str, key: &str, value: impl Into<String>) {
        self.extra_by_provider
            .entry(provider.to_string())
            .or_default()
            .insert(key.to_string(), vec![value.into()]);
    }

    pub fn remove_extra(&mut self, provider: &str, key: &str) -> bool {
        self.extra_by_provider
            .get_mut(provider)
            .map(|extras| extras.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn groups(&self, provider: &str) -> &[Principal] {
        self.group_principals
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_member_of(&self, provider: &str, group_name: &str) -> bool {
        self.groups(provider)
            .iter()
            .any(|principal| principal.display_name == group_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Internal identifier; left empty on create to have one generated.
    pub name: String,
    pub display_name: String,
    pub external_id: String,
    pub provider: String,
    pub labels: HashMap<String, String>,
    pub creation_timestamp: DateTime<Utc>,
}

impl Group {
    pub fn new_for_provider(provider: &str, display_name: &str, external_id: &str) -> Self {
        let mut labels = HashMap::new();
        labels.insert(PROVIDER_LABEL.to_string(), provider.to_string());
        Self {
            name: String::new(),
            display_name: display_name.to_string(),
            external_id: external_id.to_string(),
            provider: provider.to_string(),
            labels,
            creation_timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub labels: HashMap<String, String>,
    pub data: HashMap<String, String>,
    pub creation_timestamp: DateTime<Utc>,
}

impl Secret {
    pub fn scim_token(namespace: &str, provider: &str, token: &str) -> Self {
        let mut labels = HashMap::new();
        labels.insert(KIND_LABEL.to_string(), SCIM_AUTH_TOKEN_KIND.to_string());
        labels.insert(PROVIDER_LABEL.to_string(), provider.to_string());
        let mut data = HashMap::new();
        data.insert(TOKEN_DATA_KEY.to_string(), token.to_string());
        Self {
            name: format!("scim-token-{}", uuid::Uuid::new_v4()),
            namespace: namespace.to_string(),
            labels,
            data,
            creation_timestamp: Utc::now(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.data.get(TOKEN_DATA_KEY).map(String::as_str)
    }
}

/// Users, groups and user attributes keyed by internal ID.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_user(&self, name: &str) -> DirectoryResult<User>;
    async fn list_users(&self) -> DirectoryResult<Vec<User>>;
    async fn update_user(&self, user: &User) -> DirectoryResult<User>;
    async fn delete_user(&self, name: &str) -> DirectoryResult<()>;

    async fn get_group(&self, name: &str) -> DirectoryResult<Group>;
    /// Groups labeled with the given provider.
    async fn list_groups(&self, provider: &str) -> DirectoryResult<Vec<Group>>;
    async fn create_group(&self, group: &Group) -> DirectoryResult<Group>;
    async fn update_group(&self, group: &Group) -> DirectoryResult<Group>;
    async fn delete_group(&self, name: &str) -> DirectoryResult<()>;

    async fn get_user_attribute(&self, name: &str) -> DirectoryResult<UserAttribute>;
    async fn update_user_attribute(&self, attr: &UserAttribute) -> DirectoryResult<UserAttribute>;
}

/// Mints internal user records for external principals.
#[async_trait]
pub trait IdentityManager: Send + Sync {
    async fn ensure_user(&self, principal_name: &str, username: &str) -> DirectoryResult<User>;

    async fn user_attribute_create_or_update(
        &self,
        user_id: &str,
        provider: &str,
        group_principals: Vec<Principal>,
        extras: HashMap<String, Vec<String>>,
    ) -> DirectoryResult<()>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Secrets in `namespace` carrying every label in `selector`.
    async fn list_secrets(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> DirectoryResult<Vec<Secret>>;

    async fn delete_secret(&self, namespace: &str, name: &str) -> DirectoryResult<()>;
}

#[async_trait]
pub trait ProviderSettings: Send + Sync {
    async fn is_disabled_provider(&self, name: &str) -> DirectoryResult<bool>;
}
