use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const PERMISSION_APPROVE_REMEDIATION: &str = "approve_remediation";
pub const PERMISSION_EXECUTE_ANY_COMMAND: &str = "execute_any_command";
pub const PERMISSION_VIEW_LOGS: &str = "view_logs";
pub const PERMISSION_VIEW_STATUS: &str = "view_status";

fn default_rbac_role() -> String {
    "viewer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleSpec {
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSpec {
    pub role: String,
}

/// Role-based access policy consulted before a plan is executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RbacPolicy {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleSpec>,
    #[serde(default)]
    pub users: BTreeMap<String, UserSpec>,
    /// Role assumed by principals missing from `users`.
    #[serde(default = "default_rbac_role")]
    pub default_role: String,
}

impl Default for RbacPolicy {
    fn default() -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(
            "admin".to_string(),
            RoleSpec {
                permissions: vec![
                    PERMISSION_EXECUTE_ANY_COMMAND.to_string(),
                    PERMISSION_APPROVE_REMEDIATION.to_string(),
                    PERMISSION_VIEW_LOGS.to_string(),
                ],
            },
        );
        roles.insert(
            "viewer".to_string(),
            RoleSpec {
                permissions: vec![
                    PERMISSION_VIEW_LOGS.to_string(),
                    PERMISSION_VIEW_STATUS.to_string(),
                ],
            },
        );
        let mut users = BTreeMap::new();
        users.insert(
            "system".to_string(),
            UserSpec {
                role: "admin".to_string(),
            },
        );
        Self {
            roles,
            users,
            default_role: default_rbac_role(),
        }
    }
}

impl RbacPolicy {
    pub fn role_of(&self, principal: &str) -> &str {
        self.users
            .get(principal.trim())
            .map(|user| user.role.as_str())
            .unwrap_or(self.default_role.as_str())
    }

    pub fn has_permission(&self, principal: &str, permission: &str) -> bool {
        self.roles
            .get(self.role_of(principal))
            .is_some_and(|role| role.permissions.iter().any(|entry| entry == permission))
    }
}

pub fn validate_rbac_policy(policy: &RbacPolicy) -> Result<()> {
    for (user, spec) in &policy.users {
        if !policy.roles.contains_key(&spec.role) {
            bail!("rbac user '{user}' references unknown role '{}'", spec.role);
        }
    }
    if !policy.roles.contains_key(&policy.default_role) {
        bail!("rbac default_role '{}' is not declared", policy.default_role);
    }
    Ok(())
}
