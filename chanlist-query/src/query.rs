use crate::{ChannelPredicate, DynamicFilter, Filter, Sort, SortKey, Sorting};
use chanlist_types::Channel;
use serde::{Deserialize, Serialize};

/// Page size used when a query does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page the backend will return.
pub const MAX_PAGE_SIZE: usize = 100;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_message_limit() -> usize {
    25
}

fn default_member_limit() -> usize {
    30
}

/// Immutable descriptor of a channel list.
///
/// One query is bound to one live view for its whole lifetime. The
/// serializable part is what the fetcher sends to the backend; the dynamic
/// filter only ever runs locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelListQuery {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub sort: Sorting,
    #[serde(default = "default_page_size")]
    page_size: usize,
    /// Messages to include per channel in fetched pages.
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    /// Members to include per channel in fetched pages.
    #[serde(default = "default_member_limit")]
    pub member_limit: usize,
    #[serde(skip)]
    dynamic_filter: Option<DynamicFilter>,
}

impl Default for ChannelListQuery {
    fn default() -> Self {
        Self::new(Filter::All)
    }
}

impl ChannelListQuery {
    /// Creates a query with the default order and page size.
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: Sorting::default(),
            page_size: DEFAULT_PAGE_SIZE,
            message_limit: default_message_limit(),
            member_limit: default_member_limit(),
            dynamic_filter: None,
        }
    }

    /// Adds a sort descriptor after the existing ones.
    #[must_use]
    pub fn sort_by(mut self, sort: Sort) -> Self {
        self.sort = self.sort.then(sort);
        self
    }

    /// Shorthand for a descending sort on `key`.
    #[must_use]
    pub fn sort_desc(self, key: SortKey) -> Self {
        self.sort_by(Sort::desc(key))
    }

    /// Shorthand for an ascending sort on `key`.
    #[must_use]
    pub fn sort_asc(self, key: SortKey) -> Self {
        self.sort_by(Sort::asc(key))
    }

    /// Sets the page size, clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Narrows the view with a local predicate.
    #[must_use]
    pub fn with_dynamic_filter(
        mut self,
        f: impl Fn(&Channel) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.dynamic_filter = Some(DynamicFilter::new(f));
        self
    }

    /// Page size, clamped even if deserialized from an out-of-range value.
    pub fn page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn dynamic_filter(&self) -> Option<&DynamicFilter> {
        self.dynamic_filter.as_ref()
    }

    /// The combined membership predicate.
    pub fn predicate(&self) -> ChannelPredicate<'_> {
        match &self.dynamic_filter {
            Some(dynamic) => ChannelPredicate::StructuralAndDynamic(&self.filter, dynamic),
            None => ChannelPredicate::Structural(&self.filter),
        }
    }
}
