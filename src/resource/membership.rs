//! Group membership derived from user attribute records.
//!
//! Groups never store their members. A user belongs to a group when the
//! user's attribute record lists a principal for the provider whose display
//! name equals the group's displayName. Every query therefore scans the
//! non-system users, and every mutation rewrites one user's principal list.
//!
//! Mutations are separate writes: a failure part way through leaves earlier
//! writes in place. Callers validate everything they can with
//! [`validate_members`] before the first write.

use std::collections::{BTreeSet, HashMap};

use crate::directory::{Directory, DirectoryError, DirectoryResult, Principal, UserAttribute};
use crate::error::{AppError, AppResult};
use crate::models::{ScimMember, USER_RESOURCE};

const EXTRA_USERNAME: &str = "username";

/// Non-system users with their attribute records, sorted by user ID.
/// Users without an attribute record are skipped.
async fn scan_attributes(directory: &dyn Directory) -> DirectoryResult<Vec<UserAttribute>> {
    let mut users = directory.list_users().await?;
    users.sort_by(|a, b| a.name.cmp(&b.name));

    let mut attributes = Vec::with_capacity(users.len());
    for user in users.iter().filter(|user| !user.is_system()) {
        match directory.get_user_attribute(&user.name).await {
            Ok(attr) => attributes.push(attr),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(attributes)
}

fn member_of(attr: &UserAttribute, provider: &str) -> ScimMember {
    ScimMember::new(&attr.name, attr.extra(provider, EXTRA_USERNAME))
}

/// Members of one group, ordered by user ID.
pub async fn get_group_members(
    directory: &dyn Directory,
    provider: &str,
    group_name: &str,
) -> DirectoryResult<Vec<ScimMember>> {
    Ok(scan_attributes(directory)
        .await?
        .iter()
        .filter(|attr| attr.is_member_of(provider, group_name))
        .map(|attr| member_of(attr, provider))
        .collect())
}

/// Members of every group of a provider in a single scan, keyed by displayName.
pub async fn get_all_group_members(
    directory: &dyn Directory,
    provider: &str,
) -> DirectoryResult<HashMap<String, Vec<ScimMember>>> {
    let mut groups: HashMap<String, Vec<ScimMember>> = HashMap::new();
    for attr in scan_attributes(directory).await? {
        for principal in attr.groups(provider) {
            let members = groups.entry(principal.display_name.clone()).or_default();
            if members.iter().all(|m| m.value != attr.name) {
                members.push(member_of(&attr, provider));
            }
        }
    }
    Ok(groups)
}

/// Checks every member before any mutation: only users are accepted and each
/// must exist as a non-system user.
pub async fn validate_members(directory: &dyn Directory, members: &[ScimMember]) -> AppResult<()> {
    for member in members {
        match member.member_type.as_deref() {
            None | Some("") => {}
            Some(kind) if kind.eq_ignore_ascii_case(USER_RESOURCE) => {}
            Some(kind) if kind.eq_ignore_ascii_case("Group") => {
                return Err(AppError::invalid_value("Nested groups are not supported"));
            }
            Some(kind) => {
                return Err(AppError::invalid_value(format!(
                    "Invalid member type '{}'",
                    kind
                )));
            }
        }

        if member.value.is_empty() {
            return Err(AppError::invalid_value("Member value must not be empty"));
        }

        match directory.get_user(&member.value).await {
            Ok(user) if !user.is_system() => {}
            Ok(_) => {
                return Err(AppError::invalid_value(format!(
                    "User with id '{}' does not exist",
                    member.value
                )))
            }
            Err(e) if e.is_not_found() => {
                return Err(AppError::invalid_value(format!(
                    "User with id '{}' does not exist",
                    member.value
                )))
            }
            Err(e) => {
                return Err(AppError::internal(format!(
                    "failed to get user {}: {}",
                    member.value, e
                )))
            }
        }
    }
    Ok(())
}

/// Makes the group's membership equal to `desired`.
///
/// Users in both sets are left untouched.
pub async fn sync_group_members(
    directory: &dyn Directory,
    provider: &str,
    group_name: &str,
    desired: &[ScimMember],
) -> AppResult<()> {
    validate_members(directory, desired).await?;

    let existing: BTreeSet<String> = get_group_members(directory, provider, group_name)
        .await
        .map_err(|e| AppError::internal(format!("failed to get group members: {}", e)))?
        .into_iter()
        .map(|member| member.value)
        .collect();
    let wanted: BTreeSet<String> = desired.iter().map(|m| m.value.clone()).collect();

    for user_id in wanted.difference(&existing) {
        add_group_member(directory, provider, group_name, user_id)
            .await
            .map_err(|e| {
                AppError::internal(format!(
                    "failed to add member {} to group {}: {}",
                    user_id, group_name, e
                ))
            })?;
    }

    for user_id in existing.difference(&wanted) {
        remove_group_member(directory, provider, group_name, user_id)
            .await
            .map_err(|e| {
                AppError::internal(format!(
                    "failed to remove member {} from group {}: {}",
                    user_id, group_name, e
                ))
            })?;
    }

    Ok(())
}

/// Adds the group principal to the user's record. No-op when already present.
pub async fn add_group_member(
    directory: &dyn Directory,
    provider: &str,
    group_name: &str,
    user_id: &str,
) -> DirectoryResult<()> {
    let user = directory.get_user(user_id).await?;
    let mut attr = directory.get_user_attribute(&user.name).await?;

    if attr.is_member_of(provider, group_name) {
        return Ok(());
    }

    attr.group_principals
        .entry(provider.to_string())
        .or_default()
        .push(Principal::group(provider, group_name));
    directory.update_user_attribute(&attr).await?;
    Ok(())
}

/// Drops the group principal from the user's record. No-op when the user is
/// not a member or no longer exists.
pub async fn remove_group_member(
    directory: &dyn Directory,
    provider: &str,
    group_name: &str,
    user_id: &str,
) -> DirectoryResult<()> {
    let mut attr = match directory.get_user_attribute(user_id).await {
        Ok(attr) => attr,
        Err(DirectoryError::NotFound { .. }) => return Ok(()),
        Err(e) => return Err(e),
    };

    let Some(principals) = attr.group_principals.get_mut(provider) else {
        return Ok(());
    };
    let Some(index) = principals
        .iter()
        .position(|principal| principal.display_name == group_name)
    else {
        return Ok(());
    };
    principals.remove(index);

    directory.update_user_attribute(&attr).await?;
    Ok(())
}

pub async fn remove_all_group_members(
    directory: &dyn Directory,
    provider: &str,
    group_name: &str,
) -> DirectoryResult<()> {
    for member in get_group_members(directory, provider, group_name).await? {
        remove_group_member(directory, provider, group_name, &member.value).await?;
    }
    Ok(())
}
