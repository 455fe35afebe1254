use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{decode_row, parse_instant};
use crate::error::DeskError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct AccountRow {
    id: serde_json::Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, alias = "is_active")]
    active: Option<bool>,
    created_at: String,
}

impl Account {
    pub fn from_row(row: &serde_json::Value) -> Result<Self, DeskError> {
        let row: AccountRow = decode_row("accounts", row)?;
        let id = match row.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(DeskError::Parse(format!("accounts row: bad id {other}"))),
        };
        let name = row
            .name
            .or(row.company_name)
            .or_else(|| row.email.clone())
            .ok_or_else(|| DeskError::Parse(format!("accounts row {id}: no name or email")))?;

        Ok(Account {
            id,
            name,
            email: row.email,
            role: row.role,
            active: row.active.unwrap_or(true),
            created_at: parse_instant(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falls_back_to_company_name() {
        let a = Account::from_row(&json!({
            "id": "acc-1",
            "company_name": "Northwind",
            "created_at": "2023-11-30T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(a.name, "Northwind");
        assert!(a.active);
    }

    #[test]
    fn nameless_account_is_rejected() {
        let err = Account::from_row(&json!({"id": 3, "created_at": "2023-11-30T12:00:00Z"}));
        assert!(matches!(err, Err(DeskError::Parse(_))));
    }
}
