use chanlist_types::{ChannelKey, Error, UserId, ViewId};
use proptest::prelude::*;
use std::str::FromStr;

// ── ChannelKey ───────────────────────────────────────────────────

#[test]
fn channel_key_display_is_cid() {
    let key = ChannelKey::messaging("general");
    assert_eq!(key.to_string(), "messaging:general");
}

#[test]
fn channel_key_parse() {
    let key: ChannelKey = "livestream:match-42".parse().unwrap();
    assert_eq!(key.kind, "livestream");
    assert_eq!(key.id, "match-42");
}

#[test]
fn channel_key_parse_keeps_colons_in_id() {
    let key = ChannelKey::parse("team:a:b").unwrap();
    assert_eq!(key.kind, "team");
    assert_eq!(key.id, "a:b");
}

#[test]
fn channel_key_parse_rejects_malformed() {
    for bad in ["", "general", ":general", "messaging:"] {
        match ChannelKey::from_str(bad) {
            Err(Error::InvalidChannelKey(s)) => assert_eq!(s, bad),
            other => panic!("expected InvalidChannelKey for {bad:?}, got {other:?}"),
        }
    }
}

#[test]
fn channel_key_orders_by_type_then_id() {
    let a = ChannelKey::new("livestream", "z");
    let b = ChannelKey::new("messaging", "a");
    let c = ChannelKey::new("messaging", "b");
    assert!(a < b);
    assert!(b < c);
}

#[test]
fn channel_key_serde_roundtrip() {
    let key = ChannelKey::messaging("general");
    let json = serde_json::to_string(&key).unwrap();
    let parsed: ChannelKey = serde_json::from_str(&json).unwrap();
    assert_eq!(key, parsed);
}

// ── UserId / ViewId ──────────────────────────────────────────────

#[test]
fn user_id_is_transparent_in_json() {
    let user = UserId::new("alice");
    assert_eq!(serde_json::to_string(&user).unwrap(), "\"alice\"");
    assert_eq!(user.as_str(), "alice");
}

#[test]
fn view_id_unique() {
    let a = ViewId::new();
    let b = ViewId::new();
    assert_ne!(a, b);
    assert_eq!(a.as_uuid().get_version_num(), 7);
}

#[test]
fn view_id_display_roundtrip() {
    let id = ViewId::new();
    let parsed: ViewId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn view_id_rejects_malformed_uuid() {
    let err = "not-a-uuid".parse::<ViewId>().unwrap_err();
    assert!(matches!(err, Error::InvalidUuid(_)));
}

proptest! {
    #[test]
    fn channel_key_display_parse_roundtrip(kind in "[a-z]{1,12}", id in "[a-zA-Z0-9:_-]{1,24}") {
        let key = ChannelKey::new(kind, id);
        let parsed = ChannelKey::parse(&key.to_string()).unwrap();
        prop_assert_eq!(key, parsed);
    }
}
