use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    #[default]
    #[serde(alias = "user")]
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Agent => f.write_str("agent"),
            Role::Customer => f.write_str("customer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            "customer" | "user" => Ok(Role::Customer),
            other => Err(format!("unknown role '{other}' (expected admin, agent or customer)")),
        }
    }
}

/// The signed-in identity, as kept in the local key-value file.
///
/// Older writers used different field names, and some left fields out
/// entirely, so everything but the email has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default, alias = "display_name", alias = "full_name")]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, alias = "avatar_url", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, alias = "authMethod", skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
}

impl Session {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        let email = email.into();
        let mut name = name.into();
        if name.trim().is_empty() {
            name = email.split('@').next().unwrap_or_default().to_string();
        }
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name,
            role,
            avatar: None,
            auth_method: Some("local".into()),
        }
    }

    /// Name shown to others and sent as the requester on new tickets.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}
