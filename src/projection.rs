//! Filter, sort and paginate entity lists.
//!
//! [`project`] is a pure function over any [`Listable`] slice. [`ListView`]
//! keeps the page state of one list screen: any filter change goes back to
//! page 1 and the page is clamped whenever the filtered set shrinks.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Priority, Project, Task, TaskStatus};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// What a list entry must expose to be filtered and sorted.
pub trait Listable {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    /// Status as the backend spells it, if the entity has one.
    fn status(&self) -> Option<&str>;
    fn priority(&self) -> Priority;
    fn due(&self) -> Option<DateTime<Utc>>;
    fn created(&self) -> Option<DateTime<Utc>>;
    /// Completed entries are never overdue.
    fn is_completed(&self) -> bool;
}

impl Listable for Task {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.title
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn due(&self) -> Option<DateTime<Utc>> {
        Task::due(self)
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        Task::created(self)
    }

    fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

impl Listable for Project {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn due(&self) -> Option<DateTime<Utc>> {
        Project::due(self)
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        Project::created(self)
    }

    fn is_completed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("completed"))
    }
}

/// Named due-date windows, evaluated against "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    /// Due in the current ISO week (Monday to Sunday).
    ThisWeek,
    /// Due in the current calendar month.
    ThisMonth,
    /// Due before now and not completed.
    Overdue,
}

impl DateWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThisWeek => "this_week",
            Self::ThisMonth => "this_month",
            Self::Overdue => "overdue",
        }
    }

    pub fn contains<T: Listable + ?Sized>(&self, item: &T, now: DateTime<Utc>) -> bool {
        let Some(due) = item.due() else {
            return false;
        };
        match self {
            Self::ThisWeek => {
                let week_start = now.date_naive()
                    - Duration::days(i64::from(now.weekday().num_days_from_monday()));
                let due_day = due.date_naive();
                due_day >= week_start && due_day < week_start + Duration::days(7)
            }
            Self::ThisMonth => due.year() == now.year() && due.month() == now.month(),
            Self::Overdue => due < now && !item.is_completed(),
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "thisweek" | "week" => Ok(Self::ThisWeek),
            "thismonth" | "month" => Ok(Self::ThisMonth),
            "overdue" => Ok(Self::Overdue),
            _ => Err(format!("Invalid date window: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most recently created first.
    #[default]
    Newest,
    Oldest,
    Name,
    /// High before medium before low; unknown last.
    Priority,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Name => "name",
            Self::Priority => "priority",
        }
    }

    fn compare<T: Listable>(&self, a: &T, b: &T) -> Ordering {
        match self {
            Self::Newest => missing_last(a.created(), b.created(), |x, y| y.cmp(x)),
            Self::Oldest => missing_last(a.created(), b.created(), |x, y| x.cmp(y)),
            Self::Name => a
                .name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()))
                .then_with(|| a.id().cmp(&b.id())),
            Self::Priority => a.priority().rank().cmp(&b.priority().rank()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "name" => Ok(Self::Name),
            "priority" => Ok(Self::Priority),
            _ => Err(format!("Invalid sort key: {}", s)),
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn missing_last<V>(
    a: Option<V>,
    b: Option<V>,
    cmp: impl FnOnce(&V, &V) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Independently applicable predicates; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub window: Option<DateWindow>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.window.is_none()
    }

    pub fn matches<T: Listable + ?Sized>(&self, item: &T, now: DateTime<Utc>) -> bool {
        let status_ok = self.status.as_deref().is_none_or(|wanted| {
            item.status()
                .is_some_and(|s| normalize(s) == normalize(wanted))
        });
        let priority_ok = self.priority.is_none_or(|p| item.priority() == p);
        let window_ok = self.window.is_none_or(|w| w.contains(item, now));
        status_ok && priority_ok && window_ok
    }
}

/// Filter then stably sort, evaluating date windows against the current
/// time.
pub fn project<T: Listable + Clone>(items: &[T], filters: &Filters, sort: Option<SortKey>) -> Vec<T> {
    project_at(items, filters, sort, Utc::now())
}

pub fn project_at<T: Listable + Clone>(
    items: &[T],
    filters: &Filters,
    sort: Option<SortKey>,
    now: DateTime<Utc>,
) -> Vec<T> {
    let mut out: Vec<T> = items
        .iter()
        .filter(|item| filters.matches(*item, now))
        .cloned()
        .collect();
    if let Some(key) = sort {
        out.sort_by(|a, b| key.compare(a, b));
    }
    out
}

/// One page of a projected list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-indexed.
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    /// Never below 1, even for an empty list.
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// Slice out `page` (clamped into range) of `items`.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        page_size,
        total: items.len(),
        total_pages,
    }
}

/// Filter, sort and page state of one list screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    filters: Filters,
    sort: Option<SortKey>,
    page: usize,
    page_size: usize,
}

impl Default for ListView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListView {
    pub fn new(page_size: usize) -> Self {
        Self {
            filters: Filters::default(),
            sort: None,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn sort(&self) -> Option<SortKey> {
        self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Replace all filters. Goes back to page 1 if anything changed.
    pub fn set_filters(&mut self, filters: Filters) {
        if filters != self.filters {
            self.filters = filters;
            self.page = 1;
        }
    }

    pub fn set_status(&mut self, status: Option<String>) {
        let filters = Filters {
            status,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_priority(&mut self, priority: Option<Priority>) {
        let filters = Filters {
            priority,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_window(&mut self, window: Option<DateWindow>) {
        let filters = Filters {
            window,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    /// Changing the order keeps the current page.
    pub fn set_sort(&mut self, sort: Option<SortKey>) {
        self.sort = sort;
    }

    /// Request a page; it is clamped against the data on the next render.
    pub fn go_to(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self) {
        self.page += 1;
    }

    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn render<T: Listable + Clone>(&mut self, items: &[T]) -> Page<T> {
        self.render_at(items, Utc::now())
    }

    /// Project `items` and return the current page. The stored page is
    /// clamped to the filtered set.
    pub fn render_at<T: Listable + Clone>(&mut self, items: &[T], now: DateTime<Utc>) -> Page<T> {
        let projected = project_at(items, &self.filters, self.sort, now);
        let page = paginate(&projected, self.page, self.page_size);
        self.page = page.page;
        page
    }
}
