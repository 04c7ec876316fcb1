//! Role hierarchy checks for the admin area.
//!
//! Roles are ordered `moderator < admin < super_admin`. The comparison itself
//! is pure; resolving a user's role goes through the [`DatabaseService`] port
//! and any failure there denies access.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::AdminUser;
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Moderator,
    Admin,
    SuperAdmin,
}

impl AdminRole {
    pub const ALL: [AdminRole; 3] = [AdminRole::Moderator, AdminRole::Admin, AdminRole::SuperAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::Moderator => "moderator",
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super_admin",
        }
    }

    pub fn rank(self) -> u8 {
        rank(self.as_str())
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown admin role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for AdminRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moderator" => Ok(AdminRole::Moderator),
            "admin" => Ok(AdminRole::Admin),
            "super_admin" => Ok(AdminRole::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Privilege level of a role name. Unknown names rank 0.
pub fn rank(role: &str) -> u8 {
    match role {
        "moderator" => 1,
        "admin" => 2,
        "super_admin" => 3,
        _ => 0,
    }
}

/// True iff both names are known roles and `user_role` ranks at least as high.
pub fn authorize(user_role: &str, required_role: &str) -> bool {
    let user = rank(user_role);
    let required = rank(required_role);
    user > 0 && required > 0 && user >= required
}

/// Resolves roles through the database and makes access decisions.
#[derive(Clone)]
pub struct Authorizer {
    db: Arc<dyn DatabaseService>,
}

impl Authorizer {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// The user's active role. Lookup failures are logged and read as "no role".
    pub async fn role_of(&self, owner_id: Uuid) -> Option<AdminRole> {
        match self.db.admin_role_of(owner_id).await {
            Ok(role) => role,
            Err(e) => {
                error!("Failed to resolve admin role for {}: {:?}", owner_id, e);
                None
            }
        }
    }

    pub async fn is_admin(&self, owner_id: Uuid) -> bool {
        self.role_of(owner_id).await.is_some()
    }

    /// Whether `owner_id` holds at least `required`.
    pub async fn require(&self, owner_id: Uuid, required: AdminRole) -> bool {
        match self.role_of(owner_id).await {
            Some(role) => authorize(role.as_str(), required.as_str()),
            None => false,
        }
    }

    /// One-time bootstrap: makes the user with `email` a super admin when no
    /// admin assignment exists yet. Every later call returns `false`.
    pub async fn initialize_first_admin(&self, email: &str) -> bool {
        match self.db.initialize_first_admin(email).await {
            Ok(true) => {
                info!("Initialized first super admin for {}", email);
                true
            }
            Ok(false) => {
                warn!("First-admin bootstrap refused for {}", email);
                false
            }
            Err(e) => {
                error!("First-admin bootstrap failed for {}: {:?}", email, e);
                false
            }
        }
    }

    /// Grants `role` to `target`. The actor must outrank both the granted role
    /// and the target's current role (super admins may do either at their own
    /// rank) and may not grant to themselves.
    pub async fn grant(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        role: AdminRole,
    ) -> PortResult<AdminUser> {
        if actor_id == target_id {
            return Err(PortError::Unauthorized);
        }
        let actor_role = self.role_of(actor_id).await.ok_or(PortError::Unauthorized)?;
        let current = self.db.admin_role_of(target_id).await?;
        let outranks = |other: AdminRole| {
            actor_role == AdminRole::SuperAdmin || actor_role.rank() > other.rank()
        };
        if !outranks(role) || !current.map_or(true, outranks) {
            warn!(
                "{} ({}) attempted to grant {} to {} (currently {:?})",
                actor_id, actor_role, role, target_id, current
            );
            return Err(PortError::Unauthorized);
        }
        let granted = self.db.grant_admin_role(target_id, role, actor_id).await?;
        info!("{} granted {} to {}", actor_id, role, target_id);
        Ok(granted)
    }

    pub async fn list_admin_users(&self) -> PortResult<Vec<AdminUser>> {
        self.db.list_admin_users().await
    }
}
