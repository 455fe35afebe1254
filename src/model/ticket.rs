use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{decode_row, parse_instant, UserRef};
use crate::error::DeskError;
use crate::query::Listable;

/// Tags a new ticket may carry when created from the board or the CLI.
pub const MAX_NEW_TICKET_TAGS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Pending,
    Resolved,
    Closed,
    Escalated,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Pending,
        TicketStatus::Resolved,
        TicketStatus::Closed,
        TicketStatus::Escalated,
    ];

    /// Value stored in the backend column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Pending => "pending",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Escalated => "escalated",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Pending => "Pending",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
            TicketStatus::Escalated => "Escalated",
        }
    }

    /// Workflow order, matching [`TicketStatus::ALL`].
    pub fn rank(&self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::InProgress => 1,
            TicketStatus::Pending => 2,
            TicketStatus::Resolved => 3,
            TicketStatus::Closed => 4,
            TicketStatus::Escalated => 5,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TicketStatus {
    type Err = DeskError;

    /// Accepts both the column values (`in_progress`) and the labels the
    /// screens used (`In Progress`, `in-progress`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "open" | "new" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "pending" | "on_hold" => Ok(TicketStatus::Pending),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            "escalated" => Ok(TicketStatus::Escalated),
            _ => Err(DeskError::Parse(format!("unknown ticket status '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
        TicketPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
            TicketPriority::Critical => "Critical",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            TicketPriority::Low => 0,
            TicketPriority::Medium => 1,
            TicketPriority::High => 2,
            TicketPriority::Critical => 3,
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TicketPriority {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "low" => Ok(TicketPriority::Low),
            "medium" | "normal" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "critical" | "urgent" => Ok(TicketPriority::Critical),
            _ => Err(DeskError::Parse(format!("unknown ticket priority '{s}'"))),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub requester: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

/// Shape of a `tickets` row, including the legacy column names some
/// screens were written against.
#[derive(Deserialize)]
struct TicketRow {
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    description: Option<String>,
    status: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    // Older rows carry the names under `assignee` and `requester`.
    #[serde(default)]
    assignee: Option<UserRef>,
    #[serde(default)]
    assigned_to: Option<UserRef>,
    #[serde(default)]
    requester: Option<UserRef>,
    #[serde(default)]
    created_by: Option<UserRef>,
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    comments: Option<Vec<CommentRow>>,
    #[serde(default)]
    attachments: Option<Vec<Attachment>>,
}

#[derive(Deserialize)]
struct CommentRow {
    #[serde(default, alias = "user")]
    author: Option<UserRef>,
    #[serde(alias = "comment", alias = "body")]
    content: String,
    created_at: String,
    #[serde(default, alias = "is_internal")]
    internal: bool,
}

impl Ticket {
    /// Relationship expansions requested when fetching tickets.
    /// `assigned_to` and `created_by` hold display names, not user ids, so
    /// they are read as plain columns.
    pub const EXPAND: &'static [&'static str] = &["comments:ticket_comments(*)"];

    /// The single mapping from a backend row to a ticket. Unknown
    /// enumerations or unparsable timestamps reject the row.
    pub fn from_row(row: &serde_json::Value) -> Result<Self, DeskError> {
        let row: TicketRow = decode_row("tickets", row)?;

        let id = match row.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(DeskError::Parse(format!("tickets row: bad id {other}"))),
        };
        let title = row
            .title
            .or(row.subject)
            .ok_or_else(|| DeskError::Parse(format!("tickets row {id}: missing title")))?;
        let created_at = parse_instant(&row.created_at)?;
        let updated_at = match row.updated_at.as_deref() {
            Some(raw) => parse_instant(raw)?,
            None => created_at,
        };
        let priority = match row.priority.as_deref() {
            Some(p) => p.parse()?,
            None => TicketPriority::Medium,
        };

        let mut comments = Vec::new();
        for c in row.comments.unwrap_or_default() {
            comments.push(Comment {
                author: c
                    .author
                    .and_then(UserRef::display_name)
                    .unwrap_or_else(|| "unknown".into()),
                content: c.content,
                created_at: parse_instant(&c.created_at)?,
                internal: c.internal,
            });
        }
        comments.sort_by_key(|c| c.created_at);

        Ok(Ticket {
            id,
            title,
            description: row.description.unwrap_or_default(),
            status: row.status.parse()?,
            priority,
            category: row.category.filter(|c| !c.is_empty()),
            tags: row.tags.unwrap_or_default(),
            assignee: row
                .assignee
                .and_then(UserRef::display_name)
                .or_else(|| row.assigned_to.and_then(UserRef::display_name)),
            requester: row
                .requester
                .and_then(UserRef::display_name)
                .or_else(|| row.created_by.and_then(UserRef::display_name)),
            created_at,
            updated_at,
            comments,
            attachments: row.attachments.unwrap_or_default(),
        })
    }
}

impl Listable for Ticket {
    fn id(&self) -> &str {
        &self.id
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }
    fn priority_key(&self) -> Option<&str> {
        Some(self.priority.as_str())
    }
    fn priority_rank(&self) -> u8 {
        self.priority.rank()
    }
    fn status_rank(&self) -> u8 {
        self.status.rank()
    }
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
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

/// Partial record sent to create a ticket. The backend assigns the id
/// and both timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
    pub tags: Vec<String>,
    pub requester: Option<String>,
}

impl NewTicket {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Adds a tag unless it is a duplicate or the form is already full.
    /// Returns whether the tag was taken.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty()
            || self.tags.len() >= MAX_NEW_TICKET_TAGS
            || self.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn to_row(&self) -> serde_json::Value {
        let mut row = serde_json::json!({
            "title": self.title,
            "description": self.description,
            "status": TicketStatus::Open.as_str(),
            "priority": self.priority.unwrap_or(TicketPriority::Medium).as_str(),
            "tags": self.tags,
        });
        if let Some(category) = &self.category {
            row["category"] = category.clone().into();
        }
        if let Some(requester) = &self.requester {
            row["created_by"] = requester.clone().into();
        }
        row
    }
}

/// Partial update. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<String>,
    /// `Some(None)` unassigns.
    pub assignee: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

impl TicketPatch {
    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TicketPatch::default()
    }

    pub fn to_row(&self) -> serde_json::Value {
        let mut row = serde_json::Map::new();
        if let Some(v) = &self.title {
            row.insert("title".into(), v.clone().into());
        }
        if let Some(v) = &self.description {
            row.insert("description".into(), v.clone().into());
        }
        if let Some(v) = self.status {
            row.insert("status".into(), v.as_str().into());
        }
        if let Some(v) = self.priority {
            row.insert("priority".into(), v.as_str().into());
        }
        if let Some(v) = &self.category {
            row.insert("category".into(), v.clone().into());
        }
        if let Some(v) = &self.assignee {
            row.insert("assigned_to".into(), v.clone().into());
        }
        if let Some(v) = &self.tags {
            row.insert("tags".into(), v.clone().into());
        }
        serde_json::Value::Object(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> serde_json::Value {
        json!({
            "id": "T1",
            "subject": "VPN connectivity issues",
            "description": "Cannot reach the office network",
            "status": "In Progress",
            "priority": "urgent",
            "category": "Network",
            "tags": ["vpn", "remote"],
            "assignee": {"name": "Sam Ortiz", "email": "sam@example.com"},
            "created_by": "Riley",
            "created_at": "2024-05-02T09:00:00+00:00",
            "comments": [
                {"author": "Sam Ortiz", "content": "Looking", "created_at": "2024-05-02T11:00:00Z", "is_internal": true},
                {"user": {"name": "Riley"}, "comment": "Thanks", "created_at": "2024-05-02T10:00:00Z"}
            ],
            "attachments": [{"name": "trace.log", "size": 2048}]
        })
    }

    #[test]
    fn maps_legacy_row_shape() {
        let t = Ticket::from_row(&row()).unwrap();
        assert_eq!(t.id, "T1");
        assert_eq!(t.title, "VPN connectivity issues");
        assert_eq!(t.status, TicketStatus::InProgress);
        assert_eq!(t.priority, TicketPriority::Critical);
        assert_eq!(t.assignee.as_deref(), Some("Sam Ortiz"));
        assert_eq!(t.requester.as_deref(), Some("Riley"));
        assert_eq!(t.updated_at, t.created_at);
        assert_eq!(t.comments.len(), 2);
        assert_eq!(t.comments[0].content, "Thanks");
        assert!(t.comments[1].internal);
        assert_eq!(t.attachments[0].size, 2048);
    }

    #[test]
    fn numeric_ids_become_strings() {
        let mut r = row();
        r["id"] = json!(42);
        assert_eq!(Ticket::from_row(&r).unwrap().id, "42");
    }

    #[test]
    fn rejects_unknown_status() {
        let mut r = row();
        r["status"] = json!("vanished");
        assert!(matches!(Ticket::from_row(&r), Err(DeskError::Parse(_))));
    }

    #[test]
    fn rejects_missing_created_at() {
        let mut r = row();
        r.as_object_mut().unwrap().remove("created_at");
        assert!(Ticket::from_row(&r).is_err());
    }

    #[test]
    fn new_ticket_caps_tags() {
        let mut t = NewTicket::new("Printer jam");
        for tag in ["a", "b", "c", "d", "e"] {
            assert!(t.add_tag(tag));
        }
        assert!(!t.add_tag("f"));
        assert!(!t.add_tag("a"));
        assert_eq!(t.tags.len(), MAX_NEW_TICKET_TAGS);
    }

    #[test]
    fn patch_only_sends_set_fields() {
        let patch = TicketPatch {
            status: Some(TicketStatus::Resolved),
            assignee: Some(None),
            ..Default::default()
        };
        assert_eq!(
            patch.to_row(),
            json!({"status": "resolved", "assigned_to": null})
        );
        assert!(TicketPatch::default().is_empty());
    }

    #[test]
    fn new_ticket_row_defaults_status_and_priority() {
        let mut t = NewTicket::new("Laptop");
        t.requester = Some("Riley".into());
        let row = t.to_row();
        assert_eq!(row["status"], "open");
        assert_eq!(row["priority"], "medium");
        assert_eq!(row["created_by"], "Riley");
        assert!(row.get("category").is_none());
    }
}
