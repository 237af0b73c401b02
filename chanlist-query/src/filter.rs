use chanlist_types::{Channel, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A channel attribute a filter can address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Type,
    Id,
    Cid,
    Name,
    CreatedAt,
    UpdatedAt,
    LastMessageAt,
    PinnedAt,
    MemberCount,
    UnreadCount,
    Hidden,
    Frozen,
    /// Top-level key of the channel's custom data.
    Extra(String),
}

/// A literal a filter compares against. Timestamps are plain milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl FilterValue {
    /// Orders two values of the same kind. Mixed kinds are incomparable.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Structural filter over channels.
///
/// Evaluation is total: a comparison between mismatched kinds, or against
/// an absent value, is simply false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every channel.
    #[default]
    All,
    Equal(FilterField, FilterValue),
    In(FilterField, Vec<FilterValue>),
    Greater(FilterField, FilterValue),
    GreaterOrEqual(FilterField, FilterValue),
    Less(FilterField, FilterValue),
    LessOrEqual(FilterField, FilterValue),
    /// `true` requires the field to be present, `false` requires it absent.
    Exists(FilterField, bool),
    /// Case-insensitive prefix match on any word of a text field.
    Autocomplete(FilterField, String),
    ContainsMember(UserId),
    ContainsAllMembers(Vec<UserId>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn equal(field: FilterField, value: impl Into<FilterValue>) -> Self {
        Self::Equal(field, value.into())
    }

    /// Channels whose type is `kind`.
    pub fn of_type(kind: &str) -> Self {
        Self::equal(FilterField::Type, kind)
    }

    /// Channels `user` is a member of.
    pub fn member(user: impl Into<UserId>) -> Self {
        Self::ContainsMember(user.into())
    }

    /// Combines with another filter, flattening nested ANDs.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), f) => {
                a.push(f);
                Self::And(a)
            }
            (f, g) => Self::And(vec![f, g]),
        }
    }

    /// Evaluates the filter against a channel.
    pub fn evaluate(&self, channel: &Channel) -> bool {
        match self {
            Self::All => true,
            Self::Equal(field, value) => {
                field_value(channel, field).is_some_and(|v| v.compare(value) == Some(Ordering::Equal))
            }
            Self::In(field, values) => field_value(channel, field).is_some_and(|v| {
                values
                    .iter()
                    .any(|candidate| v.compare(candidate) == Some(Ordering::Equal))
            }),
            Self::Greater(field, value) => compare_field(channel, field, value, |o| o.is_gt()),
            Self::GreaterOrEqual(field, value) => {
                compare_field(channel, field, value, |o| o.is_ge())
            }
            Self::Less(field, value) => compare_field(channel, field, value, |o| o.is_lt()),
            Self::LessOrEqual(field, value) => compare_field(channel, field, value, |o| o.is_le()),
            Self::Exists(field, expected) => field_value(channel, field).is_some() == *expected,
            Self::Autocomplete(field, prefix) => match field_value(channel, field) {
                Some(FilterValue::String(text)) => autocomplete(&text, prefix),
                _ => false,
            },
            Self::ContainsMember(user) => channel.has_member(user),
            Self::ContainsAllMembers(users) => users.iter().all(|u| channel.has_member(u)),
            Self::And(filters) => filters.iter().all(|f| f.evaluate(channel)),
            Self::Or(filters) => filters.iter().any(|f| f.evaluate(channel)),
            Self::Nor(filters) => !filters.iter().any(|f| f.evaluate(channel)),
            Self::Not(filter) => !filter.evaluate(channel),
        }
    }

    /// Returns true if any clause addresses `field`.
    pub fn mentions(&self, field: &FilterField) -> bool {
        match self {
            Self::All | Self::ContainsMember(_) | Self::ContainsAllMembers(_) => false,
            Self::Equal(f, _)
            | Self::In(f, _)
            | Self::Greater(f, _)
            | Self::GreaterOrEqual(f, _)
            | Self::Less(f, _)
            | Self::LessOrEqual(f, _)
            | Self::Exists(f, _)
            | Self::Autocomplete(f, _) => f == field,
            Self::And(filters) | Self::Or(filters) | Self::Nor(filters) => {
                filters.iter().any(|f| f.mentions(field))
            }
            Self::Not(filter) => filter.mentions(field),
        }
    }
}

fn compare_field(
    channel: &Channel,
    field: &FilterField,
    value: &FilterValue,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    field_value(channel, field)
        .and_then(|v| v.compare(value))
        .is_some_and(accept)
}

fn autocomplete(text: &str, prefix: &str) -> bool {
    let prefix = prefix.to_lowercase();
    if prefix.is_empty() {
        return true;
    }
    let text = text.to_lowercase();
    text.starts_with(&prefix) || text.split_whitespace().any(|word| word.starts_with(&prefix))
}

fn field_value(channel: &Channel, field: &FilterField) -> Option<FilterValue> {
    match field {
        FilterField::Type => Some(FilterValue::String(channel.key.kind.clone())),
        FilterField::Id => Some(FilterValue::String(channel.key.id.clone())),
        FilterField::Cid => Some(FilterValue::String(channel.key.to_string())),
        FilterField::Name => channel.name.clone().map(FilterValue::String),
        FilterField::CreatedAt => Some(FilterValue::Int(channel.created_at.as_millis())),
        FilterField::UpdatedAt => Some(FilterValue::Int(channel.updated_at.as_millis())),
        FilterField::LastMessageAt => channel
            .last_message_at
            .map(|t| FilterValue::Int(t.as_millis())),
        FilterField::PinnedAt => channel.pinned_at.map(|t| FilterValue::Int(t.as_millis())),
        FilterField::MemberCount => Some(FilterValue::Int(i64::from(channel.member_count))),
        FilterField::UnreadCount => Some(FilterValue::Int(i64::from(channel.unread_count))),
        FilterField::Hidden => Some(FilterValue::Bool(channel.hidden)),
        FilterField::Frozen => Some(FilterValue::Bool(channel.frozen)),
        FilterField::Extra(key) => match channel.extra_field(key)? {
            serde_json::Value::Bool(b) => Some(FilterValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(FilterValue::Int),
            serde_json::Value::String(s) => Some(FilterValue::String(s.clone())),
            _ => None,
        },
    }
}
