//! Registry of the groups the bot gatekeeps.

use std::sync::LazyLock;

use bantay_core::models::managed_group::{CreateManagedGroup, ManagedGroup};
use bantay_core::models::user_record::PlatformUserId;
use bantay_core::repository::ManagedGroupRepository;
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use crate::authz::{Authorizer, require_admin};
use crate::error::{ModerationError, ModerationResult};

static INVITE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://t\.me/[A-Za-z0-9_+/-]+$").expect("valid invite link regex")
});

/// Check and trim the fields of a new group.
pub fn validate_group(input: CreateManagedGroup) -> ModerationResult<CreateManagedGroup> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(ModerationError::Validation("group name must not be empty".into()));
    }
    let link = input.link.trim().to_string();
    if !INVITE_LINK.is_match(&link) {
        return Err(ModerationError::Validation(format!(
            "group link must start with https://t.me/: {link}"
        )));
    }
    Ok(CreateManagedGroup {
        name,
        description: input.description.trim().to_string(),
        link,
    })
}

pub struct GroupRegistry<G, Z> {
    groups: G,
    authorizer: Z,
}

impl<G: ManagedGroupRepository, Z: Authorizer> GroupRegistry<G, Z> {
    pub fn new(groups: G, authorizer: Z) -> Self {
        Self { groups, authorizer }
    }

    pub async fn add_group(
        &self,
        caller: PlatformUserId,
        input: CreateManagedGroup,
    ) -> ModerationResult<ManagedGroup> {
        require_admin(&self.authorizer, caller, "add group")?;
        let group = self.groups.create(validate_group(input)?).await?;
        info!(group_id = %group.id, link = %group.link, admin = caller, "Managed group added");
        Ok(group)
    }

    pub async fn remove_group(&self, caller: PlatformUserId, id: Uuid) -> ModerationResult<ManagedGroup> {
        require_admin(&self.authorizer, caller, "remove group")?;
        let group = self.groups.delete(id).await?;
        info!(group_id = %group.id, admin = caller, "Managed group removed");
        Ok(group)
    }

    /// Public listing for `/groups`.
    pub async fn list_groups(&self) -> ModerationResult<Vec<ManagedGroup>> {
        Ok(self.groups.list().await?)
    }

    /// Called when the bot is added to a group that was registered by link.
    pub async fn bind_chat_id(&self, link: &str, chat_id: i64) -> ModerationResult<ManagedGroup> {
        let group = self.groups.set_chat_id(link.trim(), chat_id).await?;
        info!(group_id = %group.id, chat_id, "Managed group bound to chat");
        Ok(group)
    }

    /// Chats a banned user should be removed from.
    pub async fn chat_ids(&self) -> ModerationResult<Vec<i64>> {
        Ok(self
            .groups
            .list()
            .await?
            .into_iter()
            .filter_map(|g| g.chat_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, link: &str) -> CreateManagedGroup {
        CreateManagedGroup {
            name: name.into(),
            description: " Usapang Pinoy ".into(),
            link: link.into(),
        }
    }

    #[test]
    fn valid_group_is_trimmed() {
        let group = validate_group(input(" Pinoy Devs ", " https://t.me/pinoydevs ")).unwrap();
        assert_eq!(group.name, "Pinoy Devs");
        assert_eq!(group.link, "https://t.me/pinoydevs");
        assert_eq!(group.description, "Usapang Pinoy");
    }

    #[test]
    fn plain_http_links_are_accepted() {
        assert!(validate_group(input("g", "http://t.me/+AbCdEf")).is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(
            validate_group(input("  ", "https://t.me/x")),
            Err(ModerationError::Validation(_))
        ));
    }

    #[test]
    fn foreign_links_are_rejected() {
        for link in ["https://example.com/x", "t.me/x", "https://t.me/", "https://t.me/a b"] {
            assert!(validate_group(input("g", link)).is_err(), "{link}");
        }
    }
}
