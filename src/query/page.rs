/// One page of an already filtered and sorted list.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based page number actually served, after clamping.
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

/// Slice out page `page` (1-based). Out-of-range page numbers are clamped
/// into `[1, max(total_pages, 1)]`.
pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total = total_pages(items.len(), page_size);
    let number = page.clamp(1, total.max(1));
    let start = ((number - 1) * page_size).min(items.len());
    let end = (start + page_size).min(items.len());
    Page {
        items: &items[start..end],
        number,
        total_pages: total,
        total_items: items.len(),
    }
}

/// Page cursor owned by a list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn next(&mut self, total_items: usize) -> bool {
        if self.page < total_pages(total_items, self.page_size) {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Call after the underlying list changed size. A cursor left pointing
    /// past the last page goes back to page 1.
    pub fn reconcile(&mut self, total_items: usize) -> bool {
        if self.page > total_pages(total_items, self.page_size).max(1) {
            self.page = 1;
            true
        } else {
            false
        }
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> Page<'a, T> {
        paginate(items, self.page_size, self.page)
    }
}
