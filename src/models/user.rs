//! User-related models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Docente,
    Familia,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Docente => "docente",
            Role::Familia => "familia",
            Role::Admin => "admin",
        }
    }

    /// Fixed subject used when a message is sent without one.
    pub fn default_subject(&self) -> &'static str {
        match self {
            Role::Docente => "Mensaje del docente",
            Role::Familia => "Consulta familiar",
            Role::Admin => "Mensaje de administración",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docente" => Ok(Role::Docente),
            "familia" => Ok(Role::Familia),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "unknown role '{}' (expected docente, familia or admin)",
                other
            )),
        }
    }
}

/// A portal user the current user can exchange messages with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "rol")]
    pub role: Role,
}
