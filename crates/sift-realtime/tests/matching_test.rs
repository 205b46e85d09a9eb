use serde_json::{json, Value};
use sift_realtime::{RealtimeEngine, RoomId};

fn rooms_for(engine: &RealtimeEngine, document: &Value) -> Vec<RoomId> {
    engine.matching_rooms("chat", "messages", document)
}

#[test]
fn test_boolean_composition_end_to_end() {
    let engine = RealtimeEngine::new();
    let room = engine
        .subscribe(
            "alice",
            "chat",
            "messages",
            &json!({
                "bool": {
                    "must": [{ "equals": { "kind": "ticket" } }],
                    "should": [
                        { "equals": { "priority": "high" } },
                        { "equals": { "priority": "urgent" } }
                    ],
                    "must_not": [{ "exists": "archived_at" }]
                }
            }),
        )
        .unwrap();

    assert_eq!(
        rooms_for(&engine, &json!({ "kind": "ticket", "priority": "high" })),
        vec![room.clone()]
    );
    assert_eq!(
        rooms_for(&engine, &json!({ "kind": "ticket", "priority": "urgent" })),
        vec![room]
    );
    // one clause short, one clause violated
    assert!(rooms_for(&engine, &json!({ "kind": "ticket", "priority": "low" })).is_empty());
    assert!(rooms_for(
        &engine,
        &json!({ "kind": "ticket", "priority": "high", "archived_at": 173 })
    )
    .is_empty());
}

#[test]
fn test_negation_matches_documents_without_the_field() {
    let engine = RealtimeEngine::new();
    let room = engine
        .subscribe("alice", "chat", "messages", &json!({ "not": { "equals": { "status": "closed" } } }))
        .unwrap();

    assert_eq!(rooms_for(&engine, &json!({ "status": "open" })), vec![room.clone()]);
    assert_eq!(rooms_for(&engine, &json!({ "body": "hello" })), vec![room]);
    assert!(rooms_for(&engine, &json!({ "status": "closed" })).is_empty());
}

#[test]
fn test_exists_and_missing_are_duals() {
    let engine = RealtimeEngine::new();
    let with_tags = engine
        .subscribe("alice", "chat", "messages", &json!({ "exists": "tags" }))
        .unwrap();
    let without_tags = engine
        .subscribe("bob", "chat", "messages", &json!({ "missing": "tags" }))
        .unwrap();

    assert_eq!(rooms_for(&engine, &json!({ "tags": ["urgent"] })), vec![with_tags.clone()]);
    assert_eq!(rooms_for(&engine, &json!({ "body": "hi" })), vec![without_tags.clone()]);
    // empty and null-only composites count as absent
    assert_eq!(rooms_for(&engine, &json!({ "tags": [] })), vec![without_tags.clone()]);
    assert_eq!(rooms_for(&engine, &json!({ "tags": [null] })), vec![without_tags]);
    assert_eq!(rooms_for(&engine, &json!({ "tags": [null, "a"] })), vec![with_tags]);
}

#[test]
fn test_range_and_membership_operators() {
    let engine = RealtimeEngine::new();
    let priced = engine
        .subscribe(
            "alice",
            "chat",
            "messages",
            &json!({ "range": { "price": { "gte": 10, "lt": 20 } } }),
        )
        .unwrap();
    let colored = engine
        .subscribe("bob", "chat", "messages", &json!({ "in": { "color": ["red", "blue"] } }))
        .unwrap();

    assert_eq!(rooms_for(&engine, &json!({ "price": 10 })), vec![priced.clone()]);
    assert_eq!(rooms_for(&engine, &json!({ "price": 19.99 })), vec![priced]);
    assert!(rooms_for(&engine, &json!({ "price": 20 })).is_empty());
    assert!(rooms_for(&engine, &json!({ "price": "15" })).is_empty());

    assert_eq!(rooms_for(&engine, &json!({ "color": "red" })), vec![colored.clone()]);
    // membership looks at every element of an array value
    assert_eq!(rooms_for(&engine, &json!({ "color": ["green", "blue"] })), vec![colored]);
    assert!(rooms_for(&engine, &json!({ "color": "green" })).is_empty());
}

#[test]
fn test_regexp_with_flags() {
    let engine = RealtimeEngine::new();
    let room = engine
        .subscribe(
            "alice",
            "chat",
            "messages",
            &json!({ "regexp": { "author": { "value": "^jo", "flags": "i" } } }),
        )
        .unwrap();

    assert_eq!(rooms_for(&engine, &json!({ "author": "John" })), vec![room.clone()]);
    assert_eq!(rooms_for(&engine, &json!({ "author": "joan" })), vec![room]);
    assert!(rooms_for(&engine, &json!({ "author": "bob" })).is_empty());
    assert!(rooms_for(&engine, &json!({ "author": 42 })).is_empty());
}

#[test]
fn test_geo_distance_accepts_every_point_shape() {
    let engine = RealtimeEngine::new();
    let room = engine
        .subscribe(
            "alice",
            "chat",
            "messages",
            &json!({
                "geoDistance": {
                    "position": { "lat": 43.6, "lon": 3.9 },
                    "distance": "112km"
                }
            }),
        )
        .unwrap();

    // one degree of latitude is roughly 111.2 km
    assert_eq!(
        rooms_for(&engine, &json!({ "position": { "lat": 44.6, "lon": 3.9 } })),
        vec![room.clone()]
    );
    assert_eq!(
        rooms_for(&engine, &json!({ "position": [44.6, 3.9] })),
        vec![room.clone()]
    );
    assert_eq!(
        rooms_for(&engine, &json!({ "position": "44.6, 3.9" })),
        vec![room]
    );
    assert!(rooms_for(&engine, &json!({ "position": { "lat": 46.0, "lon": 3.9 } })).is_empty());
    assert!(rooms_for(&engine, &json!({ "position": "nowhere" })).is_empty());
}

#[test]
fn test_nested_fields_match_through_dotted_paths() {
    let engine = RealtimeEngine::new();
    let room = engine
        .subscribe(
            "alice",
            "chat",
            "messages",
            &json!({ "equals": { "author.city": "montpellier" } }),
        )
        .unwrap();

    assert_eq!(
        rooms_for(&engine, &json!({ "author": { "city": "montpellier", "name": "ada" } })),
        vec![room]
    );
    assert!(rooms_for(&engine, &json!({ "author": { "city": "lyon" } })).is_empty());
    assert!(rooms_for(&engine, &json!({ "author.city": 42 })).is_empty());
}

#[test]
fn test_match_all_room_sees_every_document_of_its_collection() {
    let engine = RealtimeEngine::new();
    let firehose = engine.subscribe("alice", "chat", "messages", &json!({})).unwrap();

    assert_eq!(rooms_for(&engine, &json!({ "anything": 1 })), vec![firehose.clone()]);
    assert_eq!(rooms_for(&engine, &json!({})), vec![firehose]);
    assert!(engine.matching_rooms("chat", "presence", &json!({ "anything": 1 })).is_empty());
}

#[test]
fn test_update_transitions_between_rooms() {
    let engine = RealtimeEngine::new();
    let open = engine
        .subscribe("alice", "chat", "messages", &json!({ "equals": { "status": "open" } }))
        .unwrap();
    let closed = engine
        .subscribe("bob", "chat", "messages", &json!({ "equals": { "status": "closed" } }))
        .unwrap();

    let before = rooms_for(&engine, &json!({ "status": "open", "id": 7 }));
    let after = rooms_for(&engine, &json!({ "status": "closed", "id": 7 }));
    assert_eq!(before, vec![open.clone()]);
    assert_eq!(after, vec![closed.clone()]);

    // the host derives scope from the two match sets
    let entering: Vec<_> = after.iter().filter(|room| !before.contains(room)).collect();
    let leaving: Vec<_> = before.iter().filter(|room| !after.contains(room)).collect();
    assert_eq!(entering, vec![&closed]);
    assert_eq!(leaving, vec![&open]);
}

#[test]
fn test_collections_are_isolated() {
    let engine = RealtimeEngine::new();
    let messages = engine
        .subscribe("alice", "chat", "messages", &json!({ "equals": { "status": "open" } }))
        .unwrap();
    let tickets = engine
        .subscribe("alice", "crm", "tickets", &json!({ "equals": { "status": "open" } }))
        .unwrap();
    assert_ne!(messages, tickets);

    assert_eq!(rooms_for(&engine, &json!({ "status": "open" })), vec![messages]);
    assert_eq!(
        engine.matching_rooms("crm", "tickets", &json!({ "status": "open" })),
        vec![tickets]
    );
}
