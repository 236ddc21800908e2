//! Admin authorization.

use std::collections::HashSet;

use bantay_core::models::user_record::PlatformUserId;
use tracing::warn;

use crate::error::{ModerationError, ModerationResult};

/// Decides whether a caller may use the admin control surface.
pub trait Authorizer: Send + Sync {
    fn is_admin(&self, caller: PlatformUserId) -> bool;
}

/// Fixed admin list, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAdminSet {
    admins: HashSet<PlatformUserId>,
}

impl StaticAdminSet {
    pub fn new(admins: impl IntoIterator<Item = PlatformUserId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn admins(&self) -> impl Iterator<Item = PlatformUserId> + '_ {
        self.admins.iter().copied()
    }
}

impl Authorizer for StaticAdminSet {
    fn is_admin(&self, caller: PlatformUserId) -> bool {
        self.admins.contains(&caller)
    }
}

/// Fail with `Unauthorized` unless `caller` is an admin.
pub(crate) fn require_admin(
    authorizer: &impl Authorizer,
    caller: PlatformUserId,
    operation: &str,
) -> ModerationResult<()> {
    if authorizer.is_admin(caller) {
        Ok(())
    } else {
        warn!(caller, operation, "Unauthorized admin call denied");
        Err(ModerationError::Unauthorized { caller })
    }
}
