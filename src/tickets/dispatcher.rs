use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

use crate::backend::retry::RetryPolicy;
use crate::backend::{Backend, Collection, Filter};
use crate::error::DeskError;
use crate::model::ticket::{NewTicket, Ticket, TicketPatch};

/// Create, update and delete tickets.
///
/// Each call is a single request/response and touches no local state; the
/// caller reloads the collection afterwards. Updates and deletes are retried
/// on transient failures. Creates are not, since a lost response could
/// otherwise insert the ticket twice.
#[derive(Clone)]
pub struct TicketDispatcher {
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
}

fn by_id(id: &str) -> Vec<Filter> {
    vec![Filter::eq("id", id)]
}

impl TicketDispatcher {
    pub fn new(backend: Arc<dyn Backend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub async fn create(&self, ticket: &NewTicket) -> Result<Ticket, DeskError> {
        if ticket.title.trim().is_empty() {
            return Err(DeskError::Backend {
                status: 422,
                message: "title must not be empty".into(),
            });
        }
        let row = self.backend.insert(Collection::Tickets, ticket.to_row()).await?;
        let created = Ticket::from_row(&row)?;
        tracing::info!(id = %created.id, "ticket created");
        Ok(created)
    }

    /// Last write wins.
    pub async fn update(&self, id: &str, patch: &TicketPatch) -> Result<Ticket, DeskError> {
        let rows = self.patch(id, by_id(id), patch).await?;
        match rows.first() {
            Some(row) => Ticket::from_row(row),
            None => Err(DeskError::not_found(format!("ticket {id}"))),
        }
    }

    /// Applies `patch` only if the ticket still carries `expected` as its
    /// `updated_at`. A stale version yields [`DeskError::Conflict`].
    pub async fn update_if_unchanged(
        &self,
        id: &str,
        patch: &TicketPatch,
        expected: DateTime<Utc>,
    ) -> Result<Ticket, DeskError> {
        let mut filters = by_id(id);
        filters.push(Filter::eq(
            "updated_at",
            expected.to_rfc3339_opts(SecondsFormat::Micros, true),
        ));
        let rows = self.patch(id, filters, patch).await?;
        if let Some(row) = rows.first() {
            return Ticket::from_row(row);
        }

        let backend = &self.backend;
        let filters = by_id(id);
        let filters = &filters;
        let still_there = self
            .retry
            .run("check ticket", move || backend.count(Collection::Tickets, filters))
            .await?;
        if still_there > 0 {
            tracing::warn!(%id, "update rejected: ticket changed since it was read");
            Err(DeskError::Conflict(format!("ticket {id}")))
        } else {
            Err(DeskError::not_found(format!("ticket {id}")))
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), DeskError> {
        let backend = &self.backend;
        let filters = by_id(id);
        let filters = &filters;
        let removed = self
            .retry
            .run("delete ticket", move || backend.delete(Collection::Tickets, filters))
            .await?;
        if removed.is_empty() {
            return Err(DeskError::not_found(format!("ticket {id}")));
        }
        tracing::info!(%id, "ticket deleted");
        Ok(())
    }

    async fn patch(
        &self,
        id: &str,
        filters: Vec<Filter>,
        patch: &TicketPatch,
    ) -> Result<Vec<serde_json::Value>, DeskError> {
        if patch.is_empty() {
            return Err(DeskError::Backend {
                status: 422,
                message: "nothing to update".into(),
            });
        }
        let backend = &self.backend;
        let filters = &filters;
        let body = patch.to_row();
        let body = &body;
        let rows = self
            .retry
            .run("update ticket", move || {
                backend.update(Collection::Tickets, filters, body.clone())
            })
            .await?;
        tracing::info!(%id, matched = rows.len(), "ticket update sent");
        Ok(rows)
    }
}
