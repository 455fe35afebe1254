use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::{require_filters, Backend, Collection, Filter, Order, Select};
use crate::error::DeskError;
use crate::model::parse_instant;

/// In-process backend with the same contract as the hosted one. Used for
/// offline mode and tests. Relationship expansion is a no-op: rows are
/// stored already denormalized.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<Collection, Vec<Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, collection: Collection, rows: Vec<Value>) -> Self {
        self.lock().entry(collection).or_default().extend(rows);
        self
    }

    /// Seed from a JSON object keyed by collection name, each holding an
    /// array of rows.
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let seed: HashMap<String, Vec<Value>> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
        let mut backend = Self::new();
        for (name, rows) in seed {
            let collection: Collection = name.parse().map_err(anyhow::Error::msg)?;
            backend = backend.with_rows(collection, rows);
        }
        Ok(backend)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Collection, Vec<Value>>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq(_, v) => match as_text(field) {
            Some(f) if f == *v => true,
            // Timestamp columns compare as instants, like the database does.
            Some(f) => matches!((parse_instant(&f), parse_instant(v)), (Ok(a), Ok(b)) if a == b),
            None => false,
        },
        Filter::In(_, vs) => as_text(field).is_some_and(|f| vs.contains(&f)),
        Filter::Is(_, b) => field.as_bool() == Some(*b),
        Filter::Contains(_, v) => {
            as_text(field).is_some_and(|f| f.to_lowercase().contains(&v.to_lowercase()))
        }
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

fn compare_column(a: &Value, b: &Value, column: &str) -> Ordering {
    let (a, b) = (a.get(column), b.get(column));
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (parse_instant(x), parse_instant(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn sort_rows(rows: &mut [Value], order: &Order) {
    rows.sort_by(|a, b| {
        let ord = compare_column(a, b, &order.column);
        if order.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn object(row: Value, collection: Collection) -> Result<Map<String, Value>, DeskError> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(DeskError::Backend {
            status: 400,
            message: format!("{collection}: expected an object, got {other}"),
        }),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn select(&self, collection: Collection, query: &Select) -> Result<Vec<Value>, DeskError> {
        let tables = self.lock();
        let mut rows: Vec<Value> = tables
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_rows(&mut rows, &query.order);
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, DeskError> {
        let mut map = object(row, collection)?;
        let stamp = now();
        map.entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        map.entry("created_at")
            .or_insert_with(|| Value::String(stamp.clone()));
        map.entry("updated_at").or_insert_with(|| Value::String(stamp));

        let row = Value::Object(map);
        let mut tables = self.lock();
        let table = tables.entry(collection).or_default();
        if let Some(id) = row.get("id").and_then(as_text) {
            if table.iter().any(|r| r.get("id").and_then(as_text).as_deref() == Some(id.as_str())) {
                return Err(DeskError::Backend {
                    status: 409,
                    message: format!("duplicate key: {collection} id {id} already exists"),
                });
            }
        }
        table.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, DeskError> {
        require_filters("update", filters)?;
        let patch = object(patch, collection)?;
        if patch.contains_key("id") {
            return Err(DeskError::Backend {
                status: 400,
                message: format!("{collection}: id cannot be changed"),
            });
        }
        let stamp = now();
        let mut tables = self.lock();
        let mut updated = Vec::new();
        if let Some(table) = tables.get_mut(&collection) {
            for row in table.iter_mut().filter(|r| matches_all(r, filters)) {
                if let Value::Object(map) = row {
                    for (k, v) in &patch {
                        map.insert(k.clone(), v.clone());
                    }
                    if !patch.contains_key("updated_at") {
                        map.insert("updated_at".into(), Value::String(stamp.clone()));
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, filters: &[Filter]) -> Result<Vec<Value>, DeskError> {
        require_filters("delete", filters)?;
        let mut tables = self.lock();
        let Some(table) = tables.get_mut(&collection) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            table.drain(..).partition(|r| matches_all(r, filters));
        *table = kept;
        Ok(removed)
    }

    async fn count(&self, collection: Collection, filters: &[Filter]) -> Result<u64, DeskError> {
        let tables = self.lock();
        Ok(tables
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| matches_all(r, filters)).count() as u64)
            .unwrap_or(0))
    }
}
