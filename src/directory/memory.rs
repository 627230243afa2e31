use async_trait::async_trait;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    Directory, DirectoryError, DirectoryResult, Group, IdentityManager, Principal,
    ProviderSettings, Secret, SecretStore, User, UserAttribute, PROVIDER_LABEL,
};

#[derive(Default)]
struct State {
    users: BTreeMap<String, User>,
    attributes: HashMap<String, UserAttribute>,
    groups: BTreeMap<String, Group>,
    secrets: BTreeMap<(String, String), Secret>,
}

/// Directory kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    state: RwLock<State>,
    disabled_providers: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`DirectoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_provider_disabled(&self, provider: &str, disabled: bool) {
        if let Ok(mut providers) = self.disabled_providers.write() {
            if disabled {
                providers.insert(provider.to_string());
            } else {
                providers.remove(provider);
            }
        }
    }

    fn read(&self) -> DirectoryResult<RwLockReadGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        self.state
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }

    fn write(&self) -> DirectoryResult<RwLockWriteGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        self.state
            .write()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }

    pub fn insert_user(&self, user: User) -> DirectoryResult<User> {
        let mut state = self.write()?;
        state.users.insert(user.name.clone(), user.clone());
        Ok(user)
    }

    pub fn insert_user_attribute(&self, attr: UserAttribute) -> DirectoryResult<UserAttribute> {
        let mut state = self.write()?;
        state.attributes.insert(attr.name.clone(), attr.clone());
        Ok(attr)
    }

    pub fn insert_group(&self, group: Group) -> DirectoryResult<Group> {
        let mut state = self.write()?;
        state.groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }

    pub fn insert_secret(&self, secret: Secret) -> DirectoryResult<Secret> {
        let mut state = self.write()?;
        state.secrets.insert(
            (secret.namespace.clone(), secret.name.clone()),
            secret.clone(),
        );
        Ok(secret)
    }

    pub fn secret_count(&self) -> usize {
        self.read().map(|state| state.secrets.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_user(&self, name: &str) -> DirectoryResult<User> {
        self.read()?
            .users
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("user", name))
    }

    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn update_user(&self, user: &User) -> DirectoryResult<User> {
        let mut state = self.write()?;
        match state.users.get_mut(&user.name) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user.clone())
            }
            None => Err(DirectoryError::not_found("user", &user.name)),
        }
    }

    async fn delete_user(&self, name: &str) -> DirectoryResult<()> {
        let mut state = self.write()?;
        if state.users.remove(name).is_none() {
            return Err(DirectoryError::not_found("user", name));
        }
        state.attributes.remove(name);
        Ok(())
    }

    async fn get_group(&self, name: &str) -> DirectoryResult<Group> {
        self.read()?
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("group", name))
    }

    async fn list_groups(&self, provider: &str) -> DirectoryResult<Vec<Group>> {
        Ok(self
            .read()?
            .groups
            .values()
            .filter(|group| {
                group.labels.get(PROVIDER_LABEL).map(String::as_str) == Some(provider)
            })
            .cloned()
            .collect())
    }

    async fn create_group(&self, group: &Group) -> DirectoryResult<Group> {
        let mut state = self.write()?;
        let mut created = group.clone();
        if created.name.is_empty() {
            created.name = loop {
                let candidate = format!("grp-{}", random_suffix(5));
                if !state.groups.contains_key(&candidate) {
                    break candidate;
                }
            };
        } else if state.groups.contains_key(&created.name) {
            return Err(DirectoryError::AlreadyExists {
                kind: "group",
                name: created.name,
            });
        }
        created.creation_timestamp = Utc::now();
        state.groups.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn update_group(&self, group: &Group) -> DirectoryResult<Group> {
        let mut state = self.write()?;
        match state.groups.get_mut(&group.name) {
            Some(existing) => {
                *existing = group.clone();
                Ok(group.clone())
            }
            None => Err(DirectoryError::not_found("group", &group.name)),
        }
    }

    async fn delete_group(&self, name: &str) -> DirectoryResult<()> {
        self.write()?
            .groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::not_found("group", name))
    }

    async fn get_user_attribute(&self, name: &str) -> DirectoryResult<UserAttribute> {
        self.read()?
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("userattribute", name))
    }

    async fn update_user_attribute(&self, attr: &UserAttribute) -> DirectoryResult<UserAttribute> {
        let mut state = self.write()?;
        match state.attributes.get_mut(&attr.name) {
            Some(existing) => {
                *existing = attr.clone();
                Ok(attr.clone())
            }
            None => Err(DirectoryError::not_found("userattribute", &attr.name)),
        }
    }
}

#[async_trait]
impl IdentityManager for InMemoryDirectory {
    async fn ensure_user(&self, principal_name: &str, username: &str) -> DirectoryResult<User> {
        let mut state = self.write()?;
        if let Some(existing) = state
            .users
            .values()
            .find(|user| user.principal_ids.iter().any(|id| id == principal_name))
        {
            return Ok(existing.clone());
        }

        let name = loop {
            let candidate = format!("u-{}", random_suffix(10));
            if !state.users.contains_key(&candidate) {
                break candidate;
            }
        };
        let user = User {
            name: name.clone(),
            username: username.to_string(),
            principal_ids: vec![principal_name.to_string()],
            enabled: Some(true),
            system: false,
            default_admin: false,
            creation_timestamp: Utc::now(),
        };
        state.users.insert(name, user.clone());
        Ok(user)
    }

    async fn user_attribute_create_or_update(
        &self,
        user_id: &str,
        provider: &str,
        group_principals: Vec<Principal>,
        extras: HashMap<String, Vec<String>>,
    ) -> DirectoryResult<()> {
        let mut state = self.write()?;
        if !state.users.contains_key(user_id) {
            return Err(DirectoryError::not_found("user", user_id));
        }
        let attr = state
            .attributes
            .entry(user_id.to_string())
            .or_insert_with(|| UserAttribute::new(user_id));
        attr.group_principals
            .insert(provider.to_string(), group_principals);
        attr.extra_by_provider.insert(provider.to_string(), extras);
        Ok(())
    }
}

#[async_trait]
impl SecretStore for InMemoryDirectory {
    async fn list_secrets(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> DirectoryResult<Vec<Secret>> {
        Ok(self
            .read()?
            .secrets
            .values()
            .filter(|secret| secret.namespace == namespace)
            .filter(|secret| {
                selector
                    .iter()
                    .all(|(key, value)| secret.labels.get(*key).map(String::as_str) == Some(*value))
            })
            .cloned()
            .collect())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> DirectoryResult<()> {
        self.write()?
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| DirectoryError::not_found("secret", name))
    }
}

#[async_trait]
impl ProviderSettings for InMemoryDirectory {
    async fn is_disabled_provider(&self, name: &str) -> DirectoryResult<bool> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        self.disabled_providers
            .read()
            .map(|providers| providers.contains(name))
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }
}
