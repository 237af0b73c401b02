use crate::{ChannelListQuery, Filter, FilterField};
use chanlist_types::Channel;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied predicate evaluated locally on top of the structural
/// filter, e.g. a search box that narrows an already-loaded list.
///
/// Must be pure: the engine re-evaluates it on every attribute change.
#[derive(Clone)]
pub struct DynamicFilter(Arc<dyn Fn(&Channel) -> bool + Send + Sync>);

impl DynamicFilter {
    pub fn new(f: impl Fn(&Channel) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn evaluate(&self, channel: &Channel) -> bool {
        (self.0)(channel)
    }
}

impl fmt::Debug for DynamicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynamicFilter(..)")
    }
}

/// The combined membership test of a query.
#[derive(Debug, Clone, Copy)]
pub enum ChannelPredicate<'a> {
    Structural(&'a Filter),
    StructuralAndDynamic(&'a Filter, &'a DynamicFilter),
}

impl ChannelPredicate<'_> {
    /// Returns true if the channel belongs in the view.
    ///
    /// Hidden channels are excluded unless the filter asks about visibility.
    pub fn matches(&self, channel: &Channel) -> bool {
        let filter = match self {
            Self::Structural(filter) | Self::StructuralAndDynamic(filter, _) => *filter,
        };
        if channel.hidden && !filter.mentions(&FilterField::Hidden) {
            return false;
        }
        if !filter.evaluate(channel) {
            return false;
        }
        match self {
            Self::Structural(_) => true,
            Self::StructuralAndDynamic(_, dynamic) => dynamic.evaluate(channel),
        }
    }
}

/// `matches(entity, query)`: the query's structural filter ANDed with its
/// dynamic filter, if any.
pub fn matches(channel: &Channel, query: &ChannelListQuery) -> bool {
    query.predicate().matches(channel)
}
