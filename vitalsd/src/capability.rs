//! Admin capability for privileged chat commands.
//!
//! Host control operations take an `AdminCapability`, and the only way to get
//! one is `require_admin`. The chat adapter calls it before touching the host;
//! the monitoring core never does.

use serde::Deserialize;
use thiserror::Error;

/// Identity of whoever issued a chat command, as reported by the chat bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Caller {
    pub user: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Proof that `require_admin` accepted a caller.
#[derive(Debug)]
pub struct AdminCapability {
    user: String,
}

impl AdminCapability {
    pub fn user(&self) -> &str {
        &self.user
    }
}

#[derive(Debug, Error)]
#[error("{user} does not hold the {role} role")]
pub struct PermissionDenied {
    pub user: String,
    pub role: String,
}

pub fn require_admin(caller: &Caller, admin_role: &str) -> Result<AdminCapability, PermissionDenied> {
    if caller.roles.iter().any(|r| r == admin_role) {
        Ok(AdminCapability {
            user: caller.user.clone(),
        })
    } else {
        Err(PermissionDenied {
            user: caller.user.clone(),
            role: admin_role.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(roles: &[&str]) -> Caller {
        Caller {
            user: "dana".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn admin_role_grants_capability() {
        let cap = require_admin(&caller(&["member", "Administrator"]), "Administrator").unwrap();
        assert_eq!(cap.user(), "dana");
    }

    #[test]
    fn other_roles_are_denied() {
        let err = require_admin(&caller(&["member"]), "Administrator").unwrap_err();
        assert_eq!(err.to_string(), "dana does not hold the Administrator role");
        assert!(require_admin(&caller(&[]), "Administrator").is_err());
    }

    #[test]
    fn role_match_is_exact() {
        assert!(require_admin(&caller(&["administrator"]), "Administrator").is_err());
    }
}
