use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::Listable;

/// Active list filters. Categories are ANDed together; values inside one
/// multi-select category are ORed. An empty set or `None` bound filters
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub search: String,
    pub statuses: BTreeSet<String>,
    pub priorities: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.statuses.is_empty()
            && self.priorities.is_empty()
            && self.categories.is_empty()
            && self.assignees.is_empty()
            && self.tags.is_empty()
            && self.created_from.is_none()
            && self.created_to.is_none()
    }

    pub fn clear(&mut self) {
        *self = Criteria::default();
    }

    pub fn matches<T: Listable + ?Sized>(&self, item: &T) -> bool {
        self.matches_search(item)
            && in_set(&self.statuses, item.status_key())
            && in_set(&self.priorities, item.priority_key())
            && in_set(&self.categories, item.category())
            && in_set(&self.assignees, item.assignee())
            && self.matches_tags(item)
            && self.matches_created(item)
    }

    fn matches_search<T: Listable + ?Sized>(&self, item: &T) -> bool {
        let needle = self.search.trim();
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        [item.title(), item.description(), item.id()]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    fn matches_tags<T: Listable + ?Sized>(&self, item: &T) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        item.tags()
            .iter()
            .any(|tag| self.tags.iter().any(|want| want.eq_ignore_ascii_case(tag)))
    }

    fn matches_created<T: Listable + ?Sized>(&self, item: &T) -> bool {
        let created = item.created_at();
        self.created_from.map_or(true, |from| created >= from)
            && self.created_to.map_or(true, |to| created <= to)
    }

    /// Adds the value if absent, removes it if present.
    pub fn toggle(set: &mut BTreeSet<String>, value: &str) {
        if !set.remove(value) {
            set.insert(value.to_string());
        }
    }

    /// Short human summary for footers and CLI output.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.search.trim().is_empty() {
            parts.push(format!("search:\"{}\"", self.search.trim()));
        }
        for (label, set) in [
            ("status", &self.statuses),
            ("priority", &self.priorities),
            ("category", &self.categories),
            ("assignee", &self.assignees),
            ("tag", &self.tags),
        ] {
            if !set.is_empty() {
                parts.push(format!("{label}:{}", set.iter().cloned().collect::<Vec<_>>().join("|")));
            }
        }
        if let Some(from) = self.created_from {
            parts.push(format!("since:{}", from.format("%Y-%m-%d")));
        }
        if let Some(to) = self.created_to {
            parts.push(format!("until:{}", to.format("%Y-%m-%d")));
        }
        if parts.is_empty() {
            "no filters".into()
        } else {
            parts.join(" ")
        }
    }
}

fn in_set(set: &BTreeSet<String>, value: Option<&str>) -> bool {
    if set.is_empty() {
        return true;
    }
    match value {
        Some(v) => set.iter().any(|want| want.eq_ignore_ascii_case(v)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::ticket::{TicketPriority, TicketStatus};
    use crate::query::apply;
    use crate::query::fixtures::{ids, ticket};

    #[test]
    fn search_matches_one_vpn_ticket_among_ten() {
        let mut items = vec![ticket("T1", "VPN connectivity issues from home office", TicketStatus::Open)];
        for i in 2..=10 {
            items.push(ticket(&format!("T{i}"), &format!("Printer jam on floor {i}"), TicketStatus::Open));
        }
        let criteria = Criteria {
            search: "VPN".into(),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&items, &criteria, None)), ["T1"]);
    }

    #[test]
    fn search_is_case_insensitive_over_description_and_id() {
        let mut a = ticket("INC-77", "Laptop", TicketStatus::Open);
        a.description = "Screen flickers after DOCKING".into();
        let b = ticket("INC-78", "Mouse", TicketStatus::Open);
        let items = vec![a, b];

        let by_desc = Criteria { search: "docking".into(), ..Default::default() };
        assert_eq!(ids(&apply(&items, &by_desc, None)), ["INC-77"]);

        let by_id = Criteria { search: "inc-78".into(), ..Default::default() };
        assert_eq!(ids(&apply(&items, &by_id, None)), ["INC-78"]);
    }

    #[test]
    fn status_set_is_ored() {
        let mut items = Vec::new();
        for i in 0..3 {
            items.push(ticket(&format!("o{i}"), "x", TicketStatus::Open));
        }
        for i in 0..2 {
            items.push(ticket(&format!("p{i}"), "x", TicketStatus::Pending));
        }
        for i in 0..5 {
            items.push(ticket(&format!("r{i}"), "x", TicketStatus::Resolved));
        }
        let mut criteria = Criteria::default();
        criteria.statuses.insert(TicketStatus::Open.as_str().into());
        criteria.statuses.insert(TicketStatus::Pending.as_str().into());
        assert_eq!(apply(&items, &criteria, None).len(), 5);
    }

    #[test]
    fn categories_are_anded() {
        let mut a = ticket("a", "x", TicketStatus::Open);
        a.priority = TicketPriority::High;
        let mut b = ticket("b", "x", TicketStatus::Closed);
        b.priority = TicketPriority::High;
        let items = vec![a, b];

        let mut criteria = Criteria::default();
        criteria.statuses.insert("open".into());
        criteria.priorities.insert("high".into());
        assert_eq!(ids(&apply(&items, &criteria, None)), ["a"]);
    }

    #[test]
    fn contradictory_filters_yield_empty() {
        let items = vec![ticket("a", "x", TicketStatus::Open)];
        let mut criteria = Criteria::default();
        criteria.statuses.insert("escalated".into());
        assert!(apply(&items, &criteria, None).is_empty());
    }

    #[test]
    fn empty_set_is_a_noop_after_a_real_filter() {
        let items = vec![
            ticket("a", "x", TicketStatus::Open),
            ticket("b", "x", TicketStatus::Closed),
            ticket("c", "x", TicketStatus::Open),
        ];
        let mut only_open = Criteria::default();
        only_open.statuses.insert("open".into());

        let first: Vec<_> = apply(&items, &only_open, None).into_iter().cloned().collect();
        let then_noop = apply(&first, &Criteria::default(), None);
        assert_eq!(ids(&then_noop), ids(&apply(&items, &only_open, None)));
    }

    #[test]
    fn missing_assignee_fails_assignee_filter() {
        let mut a = ticket("a", "x", TicketStatus::Open);
        a.assignee = Some("Sam Ortiz".into());
        let b = ticket("b", "x", TicketStatus::Open);
        let items = vec![a, b];
        let mut criteria = Criteria::default();
        criteria.assignees.insert("sam ortiz".into());
        assert_eq!(ids(&apply(&items, &criteria, None)), ["a"]);
    }

    #[test]
    fn any_selected_tag_matches() {
        let mut a = ticket("a", "x", TicketStatus::Open);
        a.tags = vec!["vpn".into(), "remote".into()];
        let mut b = ticket("b", "x", TicketStatus::Open);
        b.tags = vec!["hardware".into()];
        let c = ticket("c", "x", TicketStatus::Open);
        let items = vec![a, b, c];

        let mut criteria = Criteria::default();
        criteria.tags.insert("REMOTE".into());
        criteria.tags.insert("hardware".into());
        assert_eq!(ids(&apply(&items, &criteria, None)), ["a", "b"]);
    }

    #[test]
    fn date_range_is_inclusive_and_half_open_when_a_bound_is_missing() {
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap();
        let mut items = Vec::new();
        for d in 1..=5u32 {
            let mut t = ticket(&format!("d{d}"), "x", TicketStatus::Open);
            t.created_at = day(d);
            items.push(t);
        }

        let both = Criteria {
            created_from: Some(day(2)),
            created_to: Some(day(4)),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&items, &both, None)), ["d2", "d3", "d4"]);

        let from_only = Criteria { created_from: Some(day(4)), ..Default::default() };
        assert_eq!(ids(&apply(&items, &from_only, None)), ["d4", "d5"]);

        let to_only = Criteria { created_to: Some(day(1)), ..Default::default() };
        assert_eq!(ids(&apply(&items, &to_only, None)), ["d1"]);
    }

    #[test]
    fn toggle_and_describe() {
        let mut c = Criteria::default();
        assert!(c.is_empty());
        assert_eq!(c.describe(), "no filters");
        Criteria::toggle(&mut c.statuses, "open");
        assert_eq!(c.describe(), "status:open");
        Criteria::toggle(&mut c.statuses, "open");
        assert!(c.is_empty());
        c.search = "   ".into();
        assert!(c.is_empty());
    }
}
