use chanlist_types::Channel;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A channel attribute a list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Last message time, falling back to creation time.
    Default,
    LastMessageAt,
    CreatedAt,
    UpdatedAt,
    PinnedAt,
    MemberCount,
    UnreadCount,
    HasUnread,
    Name,
    Cid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// One sort descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Sort {
    pub const fn asc(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Ascending,
        }
    }

    pub const fn desc(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Descending,
        }
    }

    fn compare(&self, a: &Channel, b: &Channel) -> Ordering {
        let d = self.direction;
        match self.key {
            SortKey::Default => d.apply(a.default_sorting_at().cmp(&b.default_sorting_at())),
            SortKey::LastMessageAt => optional(a.last_message_at, b.last_message_at, d),
            SortKey::CreatedAt => d.apply(a.created_at.cmp(&b.created_at)),
            SortKey::UpdatedAt => d.apply(a.updated_at.cmp(&b.updated_at)),
            SortKey::PinnedAt => optional(a.pinned_at, b.pinned_at, d),
            SortKey::MemberCount => d.apply(a.member_count.cmp(&b.member_count)),
            SortKey::UnreadCount => d.apply(a.unread_count.cmp(&b.unread_count)),
            SortKey::HasUnread => d.apply((a.unread_count > 0).cmp(&(b.unread_count > 0))),
            SortKey::Name => optional(a.name.as_deref(), b.name.as_deref(), d),
            SortKey::Cid => d.apply(a.key.cmp(&b.key)),
        }
    }
}

/// Absent values sort after present ones in either direction.
fn optional<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => direction.apply(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ordered list of sort descriptors; the first one dominates.
///
/// An empty list sorts by [`SortKey::Default`] descending, most recently
/// active first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sorting(Vec<Sort>);

const DEFAULT_SORTING: [Sort; 1] = [Sort::desc(SortKey::Default)];

impl Sorting {
    pub fn new(sorts: Vec<Sort>) -> Self {
        Self(sorts)
    }

    /// Appends a descriptor with lower precedence than the existing ones.
    #[must_use]
    pub fn then(mut self, sort: Sort) -> Self {
        self.0.push(sort);
        self
    }

    /// The descriptors actually applied.
    pub fn descriptors(&self) -> &[Sort] {
        if self.0.is_empty() {
            &DEFAULT_SORTING
        } else {
            &self.0
        }
    }

    /// Strict total order: descriptors left to right, then channel key.
    pub fn compare(&self, a: &Channel, b: &Channel) -> Ordering {
        self.descriptors()
            .iter()
            .map(|sort| sort.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.key.cmp(&b.key))
    }

    /// Returns true if `old` and `new` (the same channel) would sort
    /// differently relative to other channels.
    pub fn position_may_change(&self, old: &Channel, new: &Channel) -> bool {
        self.descriptors()
            .iter()
            .any(|sort| sort.compare(old, new).is_ne())
    }

    /// Sorts channels in place.
    pub fn sort(&self, channels: &mut [Channel]) {
        channels.sort_by(|a, b| self.compare(a, b));
    }

    /// Returns true if the slice is strictly ordered.
    pub fn is_sorted(&self, channels: &[Channel]) -> bool {
        channels
            .windows(2)
            .all(|w| self.compare(&w[0], &w[1]) == Ordering::Less)
    }
}
