use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{CollaboratorActivity, VersionRecord};
use crate::types::{ActorId, VersionKind};

/// Page size used when a caller does not pick one.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Filter and pagination for version history listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryFilter {
    pub limit: usize,
    pub offset: usize,
    pub include_snapshots: bool,
    pub branch_name: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub actor_id: Option<ActorId>,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            include_snapshots: true,
            branch_name: None,
            from_date: None,
            to_date: None,
            actor_id: None,
        }
    }
}

impl HistoryFilter {
    /// Whether a record passes every predicate. Pagination is not applied here.
    pub fn matches(&self, record: &VersionRecord) -> bool {
        if !self.include_snapshots && record.kind == VersionKind::Snapshot {
            return false;
        }
        if let Some(branch) = &self.branch_name {
            if &record.branch_name != branch {
                return false;
            }
        }
        if let Some(actor) = &self.actor_id {
            if &record.author.id != actor {
                return false;
            }
        }
        within(record.created_at, self.from_date, self.to_date)
    }
}

/// Filter and pagination for the collaborator activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityFilter {
    pub limit: usize,
    pub offset: usize,
    pub actor_id: Option<ActorId>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            actor_id: None,
            from_date: None,
            to_date: None,
        }
    }
}

impl ActivityFilter {
    pub fn matches(&self, activity: &CollaboratorActivity) -> bool {
        if let Some(actor) = &self.actor_id {
            if &activity.actor_id != actor {
                return false;
            }
        }
        within(activity.timestamp, self.from_date, self.to_date)
    }
}

/// One page of a filtered listing plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered listing.
    pub fn paginate(matches: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = matches.len();
        let items = matches.into_iter().skip(offset).take(limit).collect();
        Self { items, total }
    }

    pub fn has_more(&self, offset: usize, limit: usize) -> bool {
        offset.saturating_add(limit) < self.total
    }
}

/// Inclusive on both ends.
fn within(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.is_none_or(|from| at >= from) && to.is_none_or(|to| at <= to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn paginate_reports_total_and_has_more() {
        let page = Page::paginate((0..10).collect::<Vec<_>>(), 2, 3);
        assert_eq!(page.items, vec![2, 3, 4]);
        assert_eq!(page.total, 10);
        assert!(page.has_more(2, 3));
        assert!(!page.has_more(7, 3));
    }

    #[test]
    fn paginate_past_the_end_is_empty() {
        let page = Page::paginate(vec![1, 2], 5, 10);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 2);
    }

    #[test]
    fn date_window_is_inclusive() {
        let t = |s| Utc.timestamp_opt(s, 0).unwrap();
        assert!(within(t(10), Some(t(10)), Some(t(10))));
        assert!(!within(t(9), Some(t(10)), None));
        assert!(!within(t(11), None, Some(t(10))));
        assert!(within(t(11), None, None));
    }

    #[test]
    fn defaults_match_documented_values() {
        let filter = HistoryFilter::default();
        assert_eq!(filter.limit, DEFAULT_PAGE_LIMIT);
        assert!(filter.include_snapshots);
        assert_eq!(ActivityFilter::default().offset, 0);
    }
}
