use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::retry::RetryPolicy;
use crate::backend::{Backend, Collection, Filter, Select};
use crate::error::DeskError;
use crate::model::account::Account;
use crate::model::article::Article;
use crate::model::ticket::Ticket;

/// Loads whole collections, newest first, mapped into typed records.
/// Nothing is cached: every call goes to the backend.
#[derive(Clone)]
pub struct Fetcher {
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(backend: Arc<dyn Backend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub async fn fetch<T>(
        &self,
        collection: Collection,
        expand: &[&str],
        map: fn(&Value) -> Result<T, DeskError>,
    ) -> Result<Vec<T>, DeskError> {
        self.fetch_where(collection, Select::expanding(expand), map).await
    }

    pub async fn fetch_where<T>(
        &self,
        collection: Collection,
        query: Select,
        map: fn(&Value) -> Result<T, DeskError>,
    ) -> Result<Vec<T>, DeskError> {
        let backend = &self.backend;
        let query = &query;
        let rows = self
            .retry
            .run(&format!("fetch {collection}"), move || backend.select(collection, query))
            .await?;
        let items = rows.iter().map(map).collect::<Result<Vec<T>, _>>()?;
        tracing::debug!(%collection, count = items.len(), "fetched");
        Ok(items)
    }

    pub async fn tickets(&self) -> Result<Vec<Ticket>, DeskError> {
        self.fetch(Collection::Tickets, Ticket::EXPAND, Ticket::from_row).await
    }

    pub async fn articles(&self) -> Result<Vec<Article>, DeskError> {
        self.fetch(Collection::KnowledgeBase, Article::EXPAND, Article::from_row)
            .await
    }

    /// What customers may read: published articles only, filtered
    /// server-side.
    pub async fn published_articles(&self) -> Result<Vec<Article>, DeskError> {
        let query = Select::expanding(Article::EXPAND)
            .filter(Filter::Is(Article::PUBLISHED_COLUMN.into(), true));
        self.fetch_where(Collection::KnowledgeBase, query, Article::from_row)
            .await
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, DeskError> {
        self.fetch(Collection::Accounts, &[], Account::from_row).await
    }

    pub async fn count(&self, collection: Collection, filters: &[Filter]) -> Result<u64, DeskError> {
        let backend = &self.backend;
        self.retry
            .run(&format!("count {collection}"), move || backend.count(collection, filters))
            .await
    }
}

/// A view's private copy of a fetched collection.
///
/// A failed reload keeps the previous items and only raises the error.
#[derive(Debug)]
pub struct CollectionState<T> {
    pub items: Vec<T>,
    pub error: Option<String>,
    pub loading: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            error: None,
            loading: false,
            loaded_at: None,
        }
    }
}

impl<T> CollectionState<T> {
    /// Marks a load as started. Returns false if one is already running.
    pub fn begin(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn finish(&mut self, result: Result<Vec<T>, DeskError>) {
        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.error = None;
                self.loaded_at = Some(Utc::now());
            }
            Err(e) => {
                tracing::error!("collection load failed, keeping {} cached rows: {e}", self.items.len());
                self.error = Some(e.to_string());
            }
        }
    }
}
