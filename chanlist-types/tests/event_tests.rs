use chanlist_types::{Channel, ChannelKey, DomainEvent, Timestamp};

fn key() -> ChannelKey {
    ChannelKey::messaging("general")
}

#[test]
fn key_of_every_variant() {
    let ch = Channel::new(key(), Timestamp::from_millis(1));
    let events = vec![
        DomainEvent::created(ch.clone()),
        DomainEvent::updated(ch),
        DomainEvent::deleted(key()),
        DomainEvent::member_added(key(), "alice"),
        DomainEvent::member_removed(key(), "alice"),
        DomainEvent::activity(key(), 5i64),
        DomainEvent::VisibilityChanged { key: key(), hidden: true },
        DomainEvent::ReadStateChanged { key: key(), unread_count: 3 },
    ];
    for event in &events {
        assert_eq!(event.key(), &key(), "{}", event.kind());
    }
}

#[test]
fn serde_uses_type_tag() {
    let event = DomainEvent::deleted(key());
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "channel_deleted");
    assert_eq!(json["data"]["key"]["id"], "general");

    let parsed: DomainEvent = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn activity_without_channel_payload_omits_field() {
    let event = DomainEvent::activity(key(), 10i64);
    let json = serde_json::to_value(&event).unwrap();
    assert!(json["data"].get("channel").is_none());
    assert_eq!(json["data"]["last_message_at"], 10);
}
