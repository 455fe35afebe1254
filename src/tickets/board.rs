use crate::error::DeskError;
use crate::model::ticket::Ticket;
use crate::query::{self, Criteria, Pagination, Sort};

use super::CollectionState;

/// List state behind the ticket board: the fetched collection plus the
/// criteria, sort and page cursor applied to it.
pub struct TicketBoard {
    pub tickets: CollectionState<Ticket>,
    criteria: Criteria,
    sort: Option<Sort>,
    pagination: Pagination,
    /// Row within the current page.
    selected: usize,
}

/// The rows on screen right now.
pub struct PageView<'a> {
    pub rows: Vec<&'a Ticket>,
    pub number: usize,
    pub total_pages: usize,
    pub total_matching: usize,
}

impl TicketBoard {
    pub fn new(page_size: usize) -> Self {
        Self {
            tickets: CollectionState::default(),
            criteria: Criteria::default(),
            sort: None,
            pagination: Pagination::new(page_size),
            selected: 0,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn sort(&self) -> Option<Sort> {
        self.sort
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn selected_row(&self) -> usize {
        self.selected
    }

    pub fn visible(&self) -> Vec<&Ticket> {
        query::apply(&self.tickets.items, &self.criteria, self.sort)
    }

    pub fn page(&self) -> PageView<'_> {
        let visible = self.visible();
        let page = self.pagination.slice(&visible);
        PageView {
            rows: page.items.to_vec(),
            number: page.number,
            total_pages: page.total_pages,
            total_matching: page.total_items,
        }
    }

    pub fn selected_ticket(&self) -> Option<&Ticket> {
        self.page().rows.get(self.selected).copied()
    }

    /// Any change to the criteria starts again from the first page.
    pub fn update_criteria(&mut self, f: impl FnOnce(&mut Criteria)) {
        f(&mut self.criteria);
        self.pagination.reset();
        self.selected = 0;
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) {
        self.sort = sort;
        self.selected = 0;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.pagination.set_page_size(page_size);
        self.selected = 0;
    }

    pub fn next_page(&mut self) -> bool {
        let total = self.visible().len();
        let moved = self.pagination.next(total);
        if moved {
            self.selected = 0;
        }
        moved
    }

    pub fn prev_page(&mut self) -> bool {
        let moved = self.pagination.prev();
        if moved {
            self.selected = 0;
        }
        moved
    }

    pub fn select_next(&mut self) {
        let rows = self.page().rows.len();
        if rows > 0 && self.selected < rows - 1 {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Install the outcome of a reload. On failure the cached rows stay.
    pub fn apply_fetch(&mut self, result: Result<Vec<Ticket>, DeskError>) {
        self.tickets.finish(result);
        let total = self.visible().len();
        if self.pagination.reconcile(total) {
            tracing::debug!(total, "page cursor reset after collection shrank");
            self.selected = 0;
        }
        let rows = self.page().rows.len();
        if self.selected >= rows {
            self.selected = rows.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ticket::TicketStatus;
    use crate::query::fixtures::ticket;
    use crate::query::{SortDirection, SortField};

    fn tickets(n: usize) -> Vec<Ticket> {
        (0..n)
            .map(|i| ticket(&format!("T{i}"), &format!("ticket {i}"), TicketStatus::Open))
            .collect()
    }

    #[test]
    fn twelve_tickets_make_two_pages() {
        let mut board = TicketBoard::new(10);
        board.apply_fetch(Ok(tickets(12)));
        let page = board.page();
        assert_eq!(page.rows.len(), 10);
        assert_eq!(page.total_pages, 2);

        assert!(board.next_page());
        assert_eq!(board.page().rows.len(), 2);
        assert!(!board.next_page());
    }

    #[test]
    fn filter_change_returns_to_first_page() {
        let mut board = TicketBoard::new(5);
        board.apply_fetch(Ok(tickets(12)));
        board.next_page();
        board.next_page();
        assert_eq!(board.pagination().page(), 3);

        board.update_criteria(|c| c.search = "ticket 1".into());
        assert_eq!(board.pagination().page(), 1);
        // "ticket 1", "ticket 10", "ticket 11"
        assert_eq!(board.page().total_matching, 3);
    }

    #[test]
    fn shrinking_reload_resets_stale_page() {
        let mut board = TicketBoard::new(5);
        board.apply_fetch(Ok(tickets(12)));
        board.next_page();
        board.next_page();
        board.apply_fetch(Ok(tickets(4)));
        assert_eq!(board.pagination().page(), 1);
        assert_eq!(board.page().rows.len(), 4);
    }

    #[test]
    fn failed_reload_keeps_rows_and_raises_error() {
        let mut board = TicketBoard::new(10);
        board.apply_fetch(Ok(tickets(3)));
        board.apply_fetch(Err(DeskError::Network("timeout".into())));
        assert_eq!(board.page().rows.len(), 3);
        assert!(board.tickets.error.is_some());
    }

    #[test]
    fn selection_stays_within_page() {
        let mut board = TicketBoard::new(10);
        board.apply_fetch(Ok(tickets(3)));
        board.select_next();
        board.select_next();
        board.select_next();
        assert_eq!(board.selected_row(), 2);
        assert_eq!(board.selected_ticket().unwrap().id, "T2");

        board.apply_fetch(Ok(tickets(1)));
        assert_eq!(board.selected_row(), 0);
        board.select_prev();
        assert_eq!(board.selected_ticket().unwrap().id, "T0");
    }

    #[test]
    fn sort_applies_to_page_rows() {
        let mut board = TicketBoard::new(2);
        board.apply_fetch(Ok(tickets(3)));
        board.set_sort(Some(Sort::new(SortField::Title, SortDirection::Desc)));
        let ids: Vec<_> = board.page().rows.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, ["T2", "T1"]);
        board.set_page_size(3);
        assert_eq!(board.page().total_pages, 1);
    }
}
