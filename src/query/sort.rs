use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::Listable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Created,
    Updated,
    Priority,
    Status,
    Title,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Created,
        SortField::Updated,
        SortField::Priority,
        SortField::Status,
        SortField::Title,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Created => "created",
            SortField::Updated => "updated",
            SortField::Priority => "priority",
            SortField::Status => "status",
            SortField::Title => "title",
        }
    }

    pub fn next(self) -> SortField {
        let idx = SortField::ALL.iter().position(|f| *f == self).unwrap_or(0);
        SortField::ALL[(idx + 1) % SortField::ALL.len()]
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created" | "created_at" => Ok(SortField::Created),
            "updated" | "updated_at" => Ok(SortField::Updated),
            "priority" => Ok(SortField::Priority),
            "status" => Ok(SortField::Status),
            "title" | "subject" => Ok(SortField::Title),
            other => Err(format!(
                "unknown sort field '{other}' (expected one of: created, updated, priority, status, title)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        };
        write!(f, "{}{arrow}", self.field)
    }
}

fn compare<T: Listable + ?Sized>(a: &T, b: &T, field: SortField) -> Ordering {
    match field {
        SortField::Created => a.created_at().cmp(&b.created_at()),
        SortField::Updated => a.updated_at().cmp(&b.updated_at()),
        SortField::Priority => a.priority_rank().cmp(&b.priority_rank()),
        SortField::Status => a.status_rank().cmp(&b.status_rank()),
        SortField::Title => a.title().to_lowercase().cmp(&b.title().to_lowercase()),
    }
}

/// Stable sort. Equal keys keep their collection order in both directions,
/// so descending is not the exact reverse of ascending when ties exist.
pub fn sort_items<T: Listable + ?Sized>(items: &mut [&T], sort: Sort) {
    items.sort_by(|a, b| {
        let ord = compare(*a, *b, sort.field);
        match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}
