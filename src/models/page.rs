// src/models/page.rs

use serde::{Deserialize, Serialize};

/// Pages shown on each side of the current one in the page bar.
const ON_EACH_SIDE: i64 = 3;
/// Pages always shown at both ends of the page bar.
const ON_ENDS: i64 = 2;

/// `?page=` query parameter. Kept as a string so junk falls back to page 1
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

/// Splits `count` rows into fixed-size pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub per_page: i64,
}

/// The slice of rows a handler should fetch for the requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
}

impl PageWindow {
    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }
}

impl Paginator {
    pub fn new(per_page: i64) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self, count: i64) -> i64 {
        if count <= 0 {
            1
        } else {
            (count + self.per_page - 1) / self.per_page
        }
    }

    /// Clamps the requested page into `[1, num_pages]`. Missing or
    /// non-numeric input means page 1.
    pub fn window(&self, count: i64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, num_pages);

        PageWindow {
            number,
            num_pages,
            count,
            per_page: self.per_page,
        }
    }
}

/// One page of results plus everything the page bar needs.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<i64>,
    pub next_page_number: Option<i64>,
    /// Page numbers to link; `None` renders as an ellipsis.
    pub page_range: Vec<Option<i64>>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        let number = window.number;
        let num_pages = window.num_pages;
        let has_previous = number > 1;
        let has_next = number < num_pages;

        Self {
            items,
            number,
            num_pages,
            count: window.count,
            has_previous,
            has_next,
            previous_page_number: has_previous.then_some(number - 1),
            next_page_number: has_next.then_some(number + 1),
            page_range: elided_page_range(number, num_pages, ON_EACH_SIDE, ON_ENDS),
        }
    }
}

/// Page numbers around `number`, with `None` standing in for skipped runs.
pub fn elided_page_range(
    number: i64,
    num_pages: i64,
    on_each_side: i64,
    on_ends: i64,
) -> Vec<Option<i64>> {
    if num_pages <= (on_each_side + on_ends) * 2 {
        return (1..=num_pages).map(Some).collect();
    }

    let mut range = Vec::new();

    if number > 1 + on_each_side + on_ends + 1 {
        range.extend((1..=on_ends).map(Some));
        range.push(None);
        range.extend((number - on_each_side..=number).map(Some));
    } else {
        range.extend((1..=number).map(Some));
    }

    if number < num_pages - on_each_side - on_ends - 1 {
        range.extend((number + 1..=number + on_each_side).map(Some));
        range.push(None);
        range.extend((num_pages - on_ends + 1..=num_pages).map(Some));
    } else {
        range.extend((number + 1..=num_pages).map(Some));
    }

    range
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_still_has_one_page() {
        let paginator = Paginator::new(10);
        let window = paginator.window(0, None);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.number, 1);
        assert_eq!(window.offset(), 0);
    }

    #[test]
    fn requested_page_is_clamped() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.window(25, Some("99")).number, 3);
        assert_eq!(paginator.window(25, Some("0")).number, 1);
        assert_eq!(paginator.window(25, Some("-4")).number, 1);
        assert_eq!(paginator.window(25, Some("abc")).number, 1);
        assert_eq!(paginator.window(25, Some("2")).offset(), 10);
    }

    #[test]
    fn neighbours() {
        let window = Paginator::new(10).window(25, Some("2"));
        let page = Page::new(vec![1, 2, 3], window);
        assert!(page.has_previous && page.has_next);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!(page.next_page_number, Some(3));
    }

    #[test]
    fn short_ranges_are_not_elided() {
        assert_eq!(
            elided_page_range(1, 10, 3, 2),
            (1..=10).map(Some).collect::<Vec<_>>()
        );
    }

    #[test]
    fn long_ranges_are_elided_on_both_sides() {
        let range = elided_page_range(50, 100, 3, 2);
        assert_eq!(
            range,
            vec![
                Some(1),
                Some(2),
                None,
                Some(47),
                Some(48),
                Some(49),
                Some(50),
                Some(51),
                Some(52),
                Some(53),
                None,
                Some(99),
                Some(100),
            ]
        );
    }

    #[test]
    fn near_the_start_only_the_right_is_elided() {
        let range = elided_page_range(2, 50, 3, 2);
        assert_eq!(
            range,
            vec![
                Some(1),
                Some(2),
                Some(3),
                Some(4),
                Some(5),
                None,
                Some(49),
                Some(50),
            ]
        );
    }

    #[test]
    fn near_the_end_only_the_left_is_elided() {
        let range = elided_page_range(49, 50, 3, 2);
        assert_eq!(
            range,
            vec![
                Some(1),
                Some(2),
                None,
                Some(46),
                Some(47),
                Some(48),
                Some(49),
                Some(50),
            ]
        );
    }
}
