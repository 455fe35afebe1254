use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{decode_row, parse_instant, UserRef};
use crate::error::DeskError;
use crate::query::Listable;

/// A knowledge-base article as the customer portal lists it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub published: bool,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ArticleRow {
    id: serde_json::Value,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    author: Option<UserRef>,
    #[serde(default, alias = "is_published")]
    published: Option<bool>,
    #[serde(default, alias = "view_count")]
    views: Option<u64>,
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
}

impl Article {
    pub const EXPAND: &'static [&'static str] = &["author:users!author_id(name,email)"];
    pub const PUBLISHED_COLUMN: &'static str = "is_published";

    pub fn from_row(row: &serde_json::Value) -> Result<Self, DeskError> {
        let row: ArticleRow = decode_row("knowledge_base", row)?;
        let id = match row.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(DeskError::Parse(format!("knowledge_base row: bad id {other}"))),
        };
        let created_at = parse_instant(&row.created_at)?;
        let updated_at = match row.updated_at.as_deref() {
            Some(raw) => parse_instant(raw)?,
            None => created_at,
        };

        Ok(Article {
            id,
            title: row.title,
            content: row.content.unwrap_or_default(),
            category: row.category.filter(|c| !c.is_empty()),
            tags: row.tags.unwrap_or_default(),
            author: row.author.and_then(UserRef::display_name),
            published: row.published.unwrap_or(true),
            views: row.views.unwrap_or(0),
            created_at,
            updated_at,
        })
    }
}

impl Listable for Article {
    fn id(&self) -> &str {
        &self.id
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn description(&self) -> &str {
        &self.content
    }
    fn status_key(&self) -> Option<&str> {
        Some(if self.published { "published" } else { "draft" })
    }
    fn status_rank(&self) -> u8 {
        u8::from(self.published)
    }
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    fn assignee(&self) -> Option<&str> {
        self.author.as_deref()
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_article_row() {
        let a = Article::from_row(&json!({
            "id": 7,
            "title": "Resetting your VPN token",
            "content": "Open the portal...",
            "category": "Network",
            "is_published": false,
            "view_count": 12,
            "created_at": "2024-02-01T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(a.id, "7");
        assert!(!a.published);
        assert_eq!(a.status_key(), Some("draft"));
        assert_eq!(a.views, 12);
    }

    #[test]
    fn status_sort_puts_drafts_before_published() {
        use crate::query::{sort::sort_items, Sort, SortDirection, SortField};

        let article = |id: &str, published: bool| {
            Article::from_row(&json!({
                "id": id,
                "title": id,
                "is_published": published,
                "created_at": "2024-02-01T08:00:00Z"
            }))
            .unwrap()
        };
        let items = vec![article("p1", true), article("d1", false), article("p2", true)];
        let mut refs: Vec<&Article> = items.iter().collect();
        sort_items(&mut refs, Sort::new(SortField::Status, SortDirection::Asc));
        let ids: Vec<_> = refs.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["d1", "p1", "p2"]);
    }

    #[test]
    fn title_is_required() {
        assert!(Article::from_row(&json!({"id": "a", "created_at": "2024-02-01T08:00:00Z"})).is_err());
    }
}
