pub mod memory;
pub mod rest;
pub mod retry;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::config::{AppConfig, BackendKind};
use crate::error::DeskError;

/// Named collections exposed by the hosted database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Tickets,
    Accounts,
    Assets,
    Users,
    KnowledgeBase,
    Notifications,
    ServiceRequests,
    Integrations,
    Rules,
    Workflows,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Tickets,
        Collection::Accounts,
        Collection::Assets,
        Collection::Users,
        Collection::KnowledgeBase,
        Collection::Notifications,
        Collection::ServiceRequests,
        Collection::Integrations,
        Collection::Rules,
        Collection::Workflows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tickets => "tickets",
            Collection::Accounts => "accounts",
            Collection::Assets => "assets",
            Collection::Users => "users",
            Collection::KnowledgeBase => "knowledge_base",
            Collection::Notifications => "notifications",
            Collection::ServiceRequests => "service_requests",
            Collection::Integrations => "integrations",
            Collection::Rules => "rules",
            Collection::Workflows => "workflows",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}

/// Server-side row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
    Is(String, bool),
    /// Case-insensitive substring match.
    Contains(String, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<String>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::In(c, _) | Filter::Is(c, _) | Filter::Contains(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            column: "created_at".into(),
            descending: true,
        }
    }
}

/// A read request. The default selects every row, unexpanded, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub expand: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Order,
}

impl Select {
    pub fn expanding(hints: &[&str]) -> Self {
        Self {
            expand: hints.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Writes that would touch every row of a table are refused by every
/// backend.
pub(crate) fn require_filters(op: &str, filters: &[Filter]) -> Result<(), DeskError> {
    if filters.is_empty() {
        return Err(DeskError::Backend {
            status: 400,
            message: format!("refusing to {op} without a filter"),
        });
    }
    Ok(())
}

/// Request/response data access over named collections. Rows travel as
/// raw JSON; typed mapping happens one layer up.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;
    async fn select(&self, collection: Collection, query: &Select) -> Result<Vec<Value>, DeskError>;
    /// Returns the stored row, with backend-assigned fields filled in.
    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, DeskError>;
    /// Returns every row the patch was applied to.
    async fn update(
        &self,
        collection: Collection,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, DeskError>;
    /// Returns every deleted row.
    async fn delete(&self, collection: Collection, filters: &[Filter]) -> Result<Vec<Value>, DeskError>;
    async fn count(&self, collection: Collection, filters: &[Filter]) -> Result<u64, DeskError>;
}


pub fn create_backend(config: &AppConfig) -> Result<Box<dyn Backend>> {
    match config.backend.kind {
        BackendKind::Rest => {
            let url = config
                .backend
                .url
                .clone()
                .context("backend.url is not set (config.toml or SERVICEDESK_URL)")?;
            let api_key = config
                .backend
                .api_key
                .clone()
                .context("backend.api_key is not set (config.toml or SERVICEDESK_API_KEY)")?;
            Ok(Box::new(rest::RestBackend::new(url, api_key)))
        }
        BackendKind::Memory => {
            let backend = match &config.backend.seed_file {
                Some(path) => memory::MemoryBackend::from_seed_file(path)?,
                None => memory::MemoryBackend::new(),
            };
            Ok(Box::new(backend))
        }
    }
}
