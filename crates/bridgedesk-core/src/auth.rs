// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Principals and role checks.
//!
//! Session issuance happens outside this workspace; callers hand in an
//! already authenticated [`Principal`] (or `None` for anonymous requests).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::BridgeError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Supervisor,
    Agent,
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Guarded mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    SendMessage,
    ManageAccounts,
    ManageRules,
}

impl Role {
    pub fn allows(self, permission: Permission) -> bool {
        match permission {
            Permission::SendMessage => true,
            Permission::ManageRules => matches!(self, Role::Admin | Role::Supervisor),
            Permission::ManageAccounts => self == Role::Admin,
        }
    }
}

/// Checks that `principal` may perform `permission`.
pub fn authorize(principal: Option<&Principal>, permission: Permission) -> Result<(), BridgeError> {
    let principal = principal.ok_or_else(|| {
        BridgeError::Authentication(format!("{permission} requires an authenticated user"))
    })?;
    if principal.role.allows(permission) {
        Ok(())
    } else {
        Err(BridgeError::Permission(format!(
            "role {} may not {permission}",
            principal.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_is_authentication_error() {
        let err = authorize(None, Permission::SendMessage).unwrap_err();
        assert_eq!(err.kind(), "authentication");
    }

    #[test]
    fn agents_send_but_do_not_manage() {
        let agent = Principal::new("u-7", Role::Agent);
        assert!(authorize(Some(&agent), Permission::SendMessage).is_ok());
        let err = authorize(Some(&agent), Permission::ManageAccounts).unwrap_err();
        assert_eq!(err.kind(), "permission");
        assert!(authorize(Some(&agent), Permission::ManageRules).is_err());
    }

    #[test]
    fn supervisor_manages_rules_only() {
        let sup = Principal::new("u-2", Role::Supervisor);
        assert!(authorize(Some(&sup), Permission::ManageRules).is_ok());
        assert!(authorize(Some(&sup), Permission::ManageAccounts).is_err());
    }

    #[test]
    fn admin_may_do_everything() {
        let admin = Principal::new("u-1", Role::Admin);
        for permission in [
            Permission::SendMessage,
            Permission::ManageAccounts,
            Permission::ManageRules,
        ] {
            assert!(authorize(Some(&admin), permission).is_ok());
        }
    }
}
