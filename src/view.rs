//! Derived list view: filter, sort, paginate, group, plus the recent strip.
//!
//! Everything here is a pure function of the contact collection and a
//! [`ViewState`]. The store and the UI recompute the whole view after every
//! change; collections are small enough that nothing is cached.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;

use crate::contact::Contact;
use crate::search;

pub const DEFAULT_PAGE_SIZE: usize = 7;
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Starred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// By first name, falling back to the display name.
    #[default]
    First,
    /// By creation time.
    Recent,
}

impl SortMode {
    pub fn toggled(self) -> Self {
        match self {
            SortMode::First => SortMode::Recent,
            SortMode::Recent => SortMode::First,
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::First => f.write_str("first name"),
            SortMode::Recent => f.write_str("recently added"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// User-controlled inputs of the list view. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub query: String,
    pub filter: FilterMode,
    pub sort: SortMode,
    pub direction: SortDirection,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            query: String::new(),
            filter: FilterMode::All,
            sort: SortMode::First,
            direction: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Contacts of the current page that share an initial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialGroup<'a> {
    pub initial: String,
    pub contacts: Vec<&'a Contact>,
}

#[derive(Debug, Clone)]
pub struct ContactView<'a> {
    /// Filtered and sorted, across all pages.
    pub filtered: Vec<&'a Contact>,
    /// The current page of `filtered`.
    pub visible: Vec<&'a Contact>,
    pub groups: Vec<InitialGroup<'a>>,
    pub total_pages: usize,
    /// Page actually shown after clamping.
    pub page: usize,
    pub recent: Vec<&'a Contact>,
}

impl ContactView<'_> {
    pub fn filtered_count(&self) -> usize {
        self.filtered.len()
    }
}

pub fn filter<'a>(contacts: &'a [Contact], state: &ViewState) -> Vec<&'a Contact> {
    let query = search::normalize_query(&state.query);
    contacts
        .iter()
        .filter(|contact| state.filter == FilterMode::All || contact.starred)
        .filter(|contact| match &query {
            Some(q) => search::matches(contact, q),
            None => true,
        })
        .collect()
}

fn compare(a: &Contact, b: &Contact, mode: SortMode) -> Ordering {
    match mode {
        SortMode::First => search::compare_names(a.sort_name(), b.sort_name()),
        // None orders before every timestamp.
        SortMode::Recent => a.created_at.cmp(&b.created_at),
    }
}

/// Stable sort; equal keys keep their relative order in both directions.
pub fn sort(contacts: &mut [&Contact], mode: SortMode, direction: SortDirection) {
    contacts.sort_by(|a, b| direction.apply(compare(a, b, mode)));
}

/// `ceil(count / page_size)`; zero for an empty list.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1))
}

pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    if total_pages == 0 {
        1
    } else {
        page.clamp(1, total_pages)
    }
}

pub fn paginate<'s, 'a>(
    sorted: &'s [&'a Contact],
    page: usize,
    page_size: usize,
) -> &'s [&'a Contact] {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= sorted.len() {
        return &[];
    }
    let end = (start + page_size).min(sorted.len());
    &sorted[start..end]
}

/// Bucket a page of contacts by initial. Buckets come back in key order and
/// keep the page order inside each bucket.
pub fn group_by_initial<'a>(page: &[&'a Contact]) -> Vec<InitialGroup<'a>> {
    let mut buckets: BTreeMap<String, Vec<&'a Contact>> = BTreeMap::new();
    for contact in page {
        buckets.entry(contact.initial()).or_default().push(contact);
    }
    buckets
        .into_iter()
        .map(|(initial, contacts)| InitialGroup { initial, contacts })
        .collect()
}

/// Newest contacts of the whole collection, ignoring filters.
pub fn recent(contacts: &[Contact], limit: usize) -> Vec<&Contact> {
    let mut all: Vec<&Contact> = contacts.iter().collect();
    sort(&mut all, SortMode::Recent, SortDirection::Desc);
    all.truncate(limit);
    all
}

pub fn compute<'a>(contacts: &'a [Contact], state: &ViewState) -> ContactView<'a> {
    let mut filtered = filter(contacts, state);
    sort(&mut filtered, state.sort, state.direction);

    let total_pages = total_pages(filtered.len(), state.page_size);
    let page = clamp_page(state.page, total_pages);
    let visible = paginate(&filtered, page, state.page_size).to_vec();
    let groups = group_by_initial(&visible);

    ContactView {
        recent: recent(contacts, RECENT_LIMIT),
        filtered,
        visible,
        groups,
        total_pages,
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::sample;

    fn names(contacts: &[&Contact]) -> Vec<String> {
        contacts.iter().map(|c| c.first_name.clone()).collect()
    }

    fn collection(count: usize) -> Vec<Contact> {
        (0..count)
            .map(|i| {
                sample(
                    &format!("id-{i}"),
                    &format!("Name{i:02}"),
                    "",
                    &format!("0917000{i:04}"),
                    i as i64,
                )
            })
            .collect()
    }

    #[test]
    fn page_count_and_page_length_hold_for_many_sizes() {
        for count in 0..20 {
            let contacts = collection(count);
            for page_size in 1..9 {
                for page in 1..6 {
                    let state = ViewState {
                        page,
                        page_size,
                        ..ViewState::default()
                    };
                    let view = compute(&contacts, &state);
                    assert_eq!(view.total_pages, count.div_ceil(page_size));
                    assert!(view.visible.len() <= page_size);
                }
            }
        }
    }

    #[test]
    fn empty_list_has_zero_pages_and_page_one() {
        let view = compute(&[], &ViewState::default());
        assert_eq!(view.total_pages, 0);
        assert_eq!(view.page, 1);
        assert!(view.visible.is_empty());
        assert!(view.groups.is_empty());
    }

    #[test]
    fn page_past_the_end_is_clamped() {
        let contacts = collection(10);
        let state = ViewState {
            page: 9,
            ..ViewState::default()
        };
        let view = compute(&contacts, &state);
        assert_eq!(view.total_pages, 2);
        assert_eq!(view.page, 2);
        assert_eq!(view.visible.len(), 3);
    }

    #[test]
    fn descending_reverses_distinct_names_and_keeps_ties_stable() {
        let contacts = vec![
            sample("1", "Carla", "One", "", 1),
            sample("2", "ana", "First", "", 2),
            sample("3", "Bea", "", "", 3),
            sample("4", "Ana", "Second", "", 4),
        ];
        let mut asc: Vec<&Contact> = contacts.iter().collect();
        sort(&mut asc, SortMode::First, SortDirection::Asc);
        let ids: Vec<&str> = asc.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2", "4", "3", "1"]);

        let mut desc: Vec<&Contact> = contacts.iter().collect();
        sort(&mut desc, SortMode::First, SortDirection::Desc);
        let ids: Vec<&str> = desc.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["1", "3", "2", "4"]);
    }

    #[test]
    fn sort_by_first_falls_back_to_display_name() {
        let mut legacy = sample("1", "", "", "", 1);
        legacy.name = "Zed Legacy".into();
        let contacts = vec![legacy, sample("2", "Mia", "", "", 2)];
        let mut sorted: Vec<&Contact> = contacts.iter().collect();
        sort(&mut sorted, SortMode::First, SortDirection::Asc);
        assert_eq!(sorted[0].id, "2");
        assert_eq!(sorted[1].id, "1");
    }

    #[test]
    fn unknown_creation_time_sorts_as_oldest() {
        let mut undated = sample("x", "Undated", "", "", 0);
        undated.created_at = None;
        let contacts = vec![sample("a", "A", "", "", 5), undated, sample("b", "B", "", "", 1)];
        let mut sorted: Vec<&Contact> = contacts.iter().collect();
        sort(&mut sorted, SortMode::Recent, SortDirection::Asc);
        let ids: Vec<&str> = sorted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["x", "b", "a"]);
    }

    #[test]
    fn query_matching_exact_email_finds_contact() {
        let mut target = sample("t", "Tess", "Cruz", "09170000001", 1);
        target.email = "tess.cruz@example.org".into();
        let contacts = vec![sample("o", "Other", "", "09170000002", 2), target];
        let state = ViewState {
            query: "tess.cruz@example.org".into(),
            ..ViewState::default()
        };
        let found = filter(&contacts, &state);
        assert!(found.iter().any(|c| c.id == "t"));
    }

    #[test]
    fn starred_filter_combines_with_query() {
        let mut starred = sample("1", "Alma", "", "", 1);
        starred.starred = true;
        let contacts = vec![starred, sample("2", "Alba", "", "", 2)];
        let state = ViewState {
            query: "al".into(),
            filter: FilterMode::Starred,
            ..ViewState::default()
        };
        assert_eq!(names(&filter(&contacts, &state)), ["Alma"]);
    }

    #[test]
    fn groups_case_insensitively_in_sorted_key_order() {
        let contacts = vec![
            sample("1", "Bob", "", "", 1),
            sample("2", "Alice", "", "", 2),
            sample("3", "alice", "", "", 3),
        ];
        let page: Vec<&Contact> = contacts.iter().collect();
        let groups = group_by_initial(&page);
        let keys: Vec<&str> = groups.iter().map(|g| g.initial.as_str()).collect();
        assert_eq!(keys, ["A", "B"]);
        assert_eq!(names(&groups[0].contacts), ["Alice", "alice"]);
        assert_eq!(names(&groups[1].contacts), ["Bob"]);
    }

    #[test]
    fn grouping_only_covers_the_current_page() {
        let contacts = vec![
            sample("1", "Ana", "", "", 1),
            sample("2", "Ben", "", "", 2),
            sample("3", "Cid", "", "", 3),
        ];
        let state = ViewState {
            page: 2,
            page_size: 2,
            ..ViewState::default()
        };
        let view = compute(&contacts, &state);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].initial, "C");
    }

    #[test]
    fn recent_ignores_filters_and_keeps_five_newest() {
        let contacts = collection(8);
        let state = ViewState {
            query: "nobody-matches-this".into(),
            ..ViewState::default()
        };
        let view = compute(&contacts, &state);
        assert!(view.filtered.is_empty());
        let ids: Vec<&str> = view.recent.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["id-7", "id-6", "id-5", "id-4", "id-3"]);
    }
}
