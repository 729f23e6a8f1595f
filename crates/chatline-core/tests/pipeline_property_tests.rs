//! Property-based tests for the synchronization pipeline
//!
//! These tests verify invariants that must hold for any arrival order:
//! normalization is idempotent, redeliveries never duplicate, the timeline
//! is chronologically ordered, and runs split exactly on sender changes.

use chatline_core::{
    group, normalize, ChatlineConfig, DeliveryState, Draft, Message, MessageId, PushEvent,
    RawPayload, ScrollConfig, ScrollPolicy, Timestamp, UserId, ViewportMetrics,
};
use chrono::FixedOffset;
use proptest::prelude::*;
use std::collections::HashSet;

mod test_utils;
use test_utils::{ack, alice_store, push, MockTimeSource, JAN_1_0900};

/// Sender/receiver pair within the alice ↔ bob conversation
fn arb_direction() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop_oneof![Just(("alice", "bob")), Just(("bob", "alice"))]
}

/// Message text with at least one visible character
fn arb_content() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-zA-Z0-9][a-zA-Z0-9 .,!?]{0,40}").unwrap()
}

/// Timestamps across roughly three days, in seconds or milliseconds
fn arb_epoch_value() -> impl Strategy<Value = u64> {
    let millis = JAN_1_0900..JAN_1_0900 + 3 * 86_400_000;
    prop_oneof![
        millis.clone(),
        millis.prop_map(|ms| ms / 1_000),
    ]
}

fn arb_push() -> impl Strategy<Value = PushEvent> {
    (
        prop::option::of("[0-9]{1,4}"),
        arb_direction(),
        prop::option::of(arb_content()),
        prop::option::of(arb_epoch_value()),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(id, (sender, receiver), content, created_at, read)| PushEvent {
            id,
            sender_id: Some(UserId::from(sender)),
            receiver_id: Some(UserId::from(receiver)),
            content,
            created_at,
            read,
            ..PushEvent::default()
        })
}

/// Delivered message for grouping tests
fn arb_message() -> impl Strategy<Value = Message> {
    (0u32..10_000, arb_direction(), 0u64..(4 * 86_400_000)).prop_map(
        |(n, (sender, receiver), offset)| Message {
            id: MessageId::server(n.to_string()),
            sender_id: UserId::from(sender),
            receiver_id: UserId::from(receiver),
            content: Some(format!("m{n}")),
            attachment: None,
            created_at: Timestamp::new(JAN_1_0900 + offset),
            delivery_state: DeliveryState::Delivered,
            is_local_echo: false,
            read: false,
            delivered: true,
        },
    )
}

proptest! {
    /// Property: normalizing a normalized message changes nothing
    #[test]
    fn normalization_is_idempotent(event in arb_push(), later in 0u64..1_000_000) {
        let now = Timestamp::new(JAN_1_0900);
        let once = normalize(event.into(), None, now).unwrap().message;
        let twice = normalize(once.clone().into(), None, now + later).unwrap().message;
        prop_assert_eq!(once, twice);
    }

    /// Property: any number of redeliveries leaves one message per server id
    #[test]
    fn redelivery_never_duplicates(
        events in prop::collection::vec((0u8..12, arb_direction(), arb_content(), 0u64..600_000), 1..40),
        repeats in prop::collection::vec(any::<prop::sample::Index>(), 0..40),
    ) {
        let clock = MockTimeSource::new_at(JAN_1_0900);
        let mut store = alice_store(&clock);

        let payloads: Vec<RawPayload> = events
            .iter()
            .map(|(id, (sender, receiver), content, offset)| {
                push(&format!("srv-{id}"), sender, receiver, content, JAN_1_0900 + offset)
            })
            .collect();

        for payload in &payloads {
            store.ingest_remote(payload.clone()).unwrap();
        }
        for index in &repeats {
            store.ingest_remote(index.get(&payloads).clone()).unwrap();
        }

        let unique: HashSet<u8> = events.iter().map(|(id, ..)| *id).collect();
        let messages = store.messages();
        prop_assert_eq!(messages.len(), unique.len());

        let visible: HashSet<MessageId> = messages.iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(visible.len(), messages.len());
    }

    /// Property: every confirmed draft leaves exactly one visible message
    #[test]
    fn confirmed_drafts_never_coexist_with_placeholders(
        texts in prop::collection::vec(arb_content(), 1..12),
        skew in prop::collection::vec(0u64..60_000, 12),
    ) {
        let clock = MockTimeSource::new_at(JAN_1_0900);
        let mut store = alice_store(&clock);

        for text in &texts {
            store.append_local(Draft::text(text.clone())).unwrap();
            clock.advance(1_000);
        }
        for (i, text) in texts.iter().enumerate() {
            let created_at = JAN_1_0900 + (i as u64) * 1_000 + skew[i];
            store.ingest_remote(ack(&format!("ack-{i}"), text, created_at)).unwrap();
        }

        let messages = store.messages();
        prop_assert_eq!(messages.len(), texts.len());
        prop_assert!(messages.iter().all(|m| m.delivery_state == DeliveryState::Delivered));
        prop_assert_eq!(store.stats().pending, 0);
    }

    /// Property: the grouped timeline is chronological and splits runs on sender change
    #[test]
    fn grouping_orders_and_splits_runs(messages in prop::collection::vec(arb_message(), 0..60)) {
        let zone = FixedOffset::east_opt(0).unwrap();
        let buckets = group(messages.clone(), zone);

        let flattened: Vec<&Message> = buckets.iter().flat_map(|b| b.messages()).collect();
        prop_assert_eq!(flattened.len(), messages.len());
        prop_assert!(flattened.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        for pair in buckets.windows(2) {
            prop_assert!(pair[0].date_key < pair[1].date_key);
        }
        for bucket in &buckets {
            prop_assert!(!bucket.runs.is_empty());
            for pair in bucket.runs.windows(2) {
                prop_assert_ne!(&pair[0].sender_id, &pair[1].sender_id);
            }
            for run in &bucket.runs {
                prop_assert!(run.messages.iter().all(|m| m.sender_id == run.sender_id));
            }
        }
    }

    /// Property: equal timestamps keep their input order
    #[test]
    fn grouping_is_stable(senders in prop::collection::vec(arb_direction(), 1..20)) {
        let zone = FixedOffset::east_opt(0).unwrap();
        let messages: Vec<Message> = senders
            .iter()
            .enumerate()
            .map(|(i, (sender, receiver))| Message {
                id: MessageId::server(i.to_string()),
                sender_id: UserId::from(*sender),
                receiver_id: UserId::from(*receiver),
                content: None,
                attachment: None,
                created_at: Timestamp::new(JAN_1_0900),
                delivery_state: DeliveryState::Delivered,
                is_local_echo: false,
                read: false,
                delivered: false,
            })
            .collect();

        let order: Vec<MessageId> = group(messages.clone(), zone)
            .iter()
            .flat_map(|b| b.messages().map(|m| m.id.clone()))
            .collect();
        let expected: Vec<MessageId> = messages.into_iter().map(|m| m.id).collect();
        prop_assert_eq!(order, expected);
    }

    /// Property: scrolling follows local messages and nearby viewports only
    #[test]
    fn scroll_policy_respects_threshold(
        message in arb_message(),
        offset in -500.0f32..5_000.0,
        height in -10.0f32..2_000.0,
        threshold in 0.0f32..400.0,
    ) {
        let policy = ScrollPolicy::new(ScrollConfig { proximity_threshold_px: threshold });
        let viewport = ViewportMetrics::new(offset, height);

        prop_assert!(policy.should_auto_scroll(&message, true, viewport));

        let expected = height <= 0.0 || offset.max(0.0) <= threshold;
        prop_assert_eq!(policy.should_auto_scroll(&message, false, viewport), expected);
    }
}

#[test]
fn testing_config_is_valid() {
    assert!(ChatlineConfig::testing().validate().is_ok());
}

#[test]
fn push_without_id_gets_synthetic_identity() {
    let now = Timestamp::new(JAN_1_0900);
    let normalized = normalize(
        RawPayload::Push(PushEvent {
            sender_id: Some(UserId::from("bob")),
            receiver_id: Some(UserId::from("alice")),
            content: Some("hi".into()),
            ..PushEvent::default()
        }),
        None,
        now,
    )
    .unwrap();

    assert!(normalized.message.local_id().is_some());
    assert_eq!(normalized.message.created_at, now);
}
