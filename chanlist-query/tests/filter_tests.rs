use chanlist_query::{Filter, FilterField, FilterValue};
use chanlist_types::{Channel, ChannelKey, Timestamp, UserId};

fn general() -> Channel {
    Channel::new(ChannelKey::messaging("general"), Timestamp::from_millis(1_000))
        .with_name("General Chat")
        .with_members(["alice", "bob"])
        .with_last_message_at(Timestamp::from_millis(5_000))
        .with_extra("team", serde_json::json!("blue"))
        .with_extra("priority", serde_json::json!(3))
}

// ── Comparisons ──────────────────────────────────────────────────

#[test]
fn all_matches_everything() {
    assert!(Filter::All.evaluate(&general()));
}

#[test]
fn equal_on_type_and_cid() {
    let ch = general();
    assert!(Filter::of_type("messaging").evaluate(&ch));
    assert!(!Filter::of_type("livestream").evaluate(&ch));
    assert!(Filter::equal(FilterField::Cid, "messaging:general").evaluate(&ch));
}

#[test]
fn in_matches_any_candidate() {
    let f = Filter::In(
        FilterField::Id,
        vec!["random".into(), "general".into()],
    );
    assert!(f.evaluate(&general()));
    assert!(!Filter::In(FilterField::Id, vec![]).evaluate(&general()));
}

#[test]
fn range_comparisons_on_timestamps() {
    let ch = general();
    assert!(Filter::Greater(FilterField::LastMessageAt, 4_999i64.into()).evaluate(&ch));
    assert!(!Filter::Greater(FilterField::LastMessageAt, 5_000i64.into()).evaluate(&ch));
    assert!(Filter::GreaterOrEqual(FilterField::LastMessageAt, 5_000i64.into()).evaluate(&ch));
    assert!(Filter::Less(FilterField::CreatedAt, 1_001i64.into()).evaluate(&ch));
    assert!(Filter::LessOrEqual(FilterField::MemberCount, 2i64.into()).evaluate(&ch));
}

#[test]
fn mismatched_kinds_are_false_not_errors() {
    let ch = general();
    assert!(!Filter::equal(FilterField::MemberCount, "two").evaluate(&ch));
    assert!(!Filter::Greater(FilterField::Name, 3i64.into()).evaluate(&ch));
    assert!(!Filter::equal(FilterField::Hidden, 0i64).evaluate(&ch));
}

#[test]
fn absent_optional_field_never_compares() {
    let ch = Channel::new(ChannelKey::messaging("quiet"), Timestamp::from_millis(1));
    assert!(!Filter::Greater(FilterField::LastMessageAt, 0i64.into()).evaluate(&ch));
    assert!(!Filter::Less(FilterField::LastMessageAt, i64::MAX.into()).evaluate(&ch));
}

#[test]
fn exists() {
    let ch = general();
    assert!(Filter::Exists(FilterField::LastMessageAt, true).evaluate(&ch));
    assert!(Filter::Exists(FilterField::PinnedAt, false).evaluate(&ch));
    assert!(Filter::Exists(FilterField::Extra("team".into()), true).evaluate(&ch));
    assert!(!Filter::Exists(FilterField::Extra("nope".into()), true).evaluate(&ch));
}

#[test]
fn extra_fields_by_kind() {
    let ch = general();
    assert!(Filter::equal(FilterField::Extra("team".into()), "blue").evaluate(&ch));
    assert!(Filter::Greater(FilterField::Extra("priority".into()), 2i64.into()).evaluate(&ch));
}

#[test]
fn autocomplete_matches_word_prefixes() {
    let ch = general();
    assert!(Filter::Autocomplete(FilterField::Name, "gen".into()).evaluate(&ch));
    assert!(Filter::Autocomplete(FilterField::Name, "CHA".into()).evaluate(&ch));
    assert!(!Filter::Autocomplete(FilterField::Name, "hat".into()).evaluate(&ch));
    assert!(!Filter::Autocomplete(FilterField::MemberCount, "2".into()).evaluate(&ch));
}

// ── Membership ───────────────────────────────────────────────────

#[test]
fn membership() {
    let ch = general();
    assert!(Filter::member("alice").evaluate(&ch));
    assert!(!Filter::member("carol").evaluate(&ch));
    assert!(
        Filter::ContainsAllMembers(vec![UserId::new("alice"), UserId::new("bob")]).evaluate(&ch)
    );
    assert!(
        !Filter::ContainsAllMembers(vec![UserId::new("alice"), UserId::new("carol")])
            .evaluate(&ch)
    );
}

// ── Combinators ──────────────────────────────────────────────────

#[test]
fn boolean_combinators() {
    let ch = general();
    let yes = Filter::of_type("messaging");
    let no = Filter::of_type("team");

    assert!(Filter::And(vec![yes.clone(), yes.clone()]).evaluate(&ch));
    assert!(!Filter::And(vec![yes.clone(), no.clone()]).evaluate(&ch));
    assert!(Filter::Or(vec![no.clone(), yes.clone()]).evaluate(&ch));
    assert!(!Filter::Or(vec![]).evaluate(&ch));
    assert!(Filter::Nor(vec![no.clone()]).evaluate(&ch));
    assert!(!Filter::Nor(vec![no.clone(), yes.clone()]).evaluate(&ch));
    assert!(Filter::Not(Box::new(no)).evaluate(&ch));
    assert!(Filter::And(vec![]).evaluate(&ch));
}

#[test]
fn and_flattens() {
    let f = Filter::All
        .and(Filter::of_type("messaging"))
        .and(Filter::member("alice"))
        .and(Filter::All);
    match f {
        Filter::And(parts) => assert_eq!(parts.len(), 2),
        other => panic!("expected And, got {other:?}"),
    }
}

#[test]
fn mentions_walks_nested_clauses() {
    let f = Filter::Or(vec![
        Filter::member("alice"),
        Filter::Not(Box::new(Filter::equal(FilterField::Hidden, true))),
    ]);
    assert!(f.mentions(&FilterField::Hidden));
    assert!(!f.mentions(&FilterField::Frozen));
}

#[test]
fn serde_roundtrip() {
    let f = Filter::of_type("messaging").and(Filter::member("alice"));
    let json = serde_json::to_string(&f).unwrap();
    let parsed: Filter = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, f);
}

#[test]
fn filter_value_untagged_json() {
    let v: FilterValue = serde_json::from_str("42").unwrap();
    assert_eq!(v, FilterValue::Int(42));
    let v: FilterValue = serde_json::from_str("\"x\"").unwrap();
    assert_eq!(v, FilterValue::String("x".into()));
    let v: FilterValue = serde_json::from_str("true").unwrap();
    assert_eq!(v, FilterValue::Bool(true));
}
