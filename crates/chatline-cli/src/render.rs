//! Text rendering of grouped timelines

use std::fmt::Write as _;

use chatline_core::{DateBucket, DeliveryState, Message, TimelineSnapshot, UserId};
use chrono::{FixedOffset, NaiveDate};

use crate::config::DisplayConfig;

/// Render one conversation as indented text
///
/// ```text
/// alice↔bob  (3 messages, 1 pending)
///   Today
///     bob
///       09:00  morning
///     alice (you)
///       09:06  on my way  · pending
/// ```
pub fn render_snapshot(
    snapshot: &TimelineSnapshot,
    local: &UserId,
    zone: FixedOffset,
    today: NaiveDate,
    display: &DisplayConfig,
) -> String {
    let mut out = String::new();
    let total: usize = snapshot.buckets.iter().map(DateBucket::message_count).sum();

    let _ = write!(out, "{}  ({} messages", snapshot.conversation, total);
    if snapshot.stats.pending > 0 {
        let _ = write!(out, ", {} pending", snapshot.stats.pending);
    }
    if snapshot.stats.failed > 0 {
        let _ = write!(out, ", {} failed", snapshot.stats.failed);
    }
    out.push_str(")\n");

    for bucket in &snapshot.buckets {
        let _ = writeln!(out, "  {}", bucket.label(today));
        for run in &bucket.runs {
            if &run.sender_id == local {
                let _ = writeln!(out, "    {} (you)", run.sender_id);
            } else {
                let _ = writeln!(out, "    {}", run.sender_id);
            }
            for message in &run.messages {
                let _ = writeln!(out, "      {}", render_message(message, zone, display));
            }
        }
    }
    out
}

fn render_message(message: &Message, zone: FixedOffset, display: &DisplayConfig) -> String {
    let time = message
        .created_at
        .to_utc()
        .with_timezone(&zone)
        .format(&display.time_format);

    let body = match (message.text(), &message.attachment) {
        (Some(text), Some(attachment)) => {
            format!("{text}  [{}] {}", attachment.kind, attachment.url)
        }
        (Some(text), None) => text.to_string(),
        (None, Some(attachment)) => format!("[{}] {}", attachment.kind, attachment.url),
        (None, None) => String::new(),
    };

    let mut line = format!("{time}  {body}");
    if display.show_delivery_state {
        match message.delivery_state {
            DeliveryState::Pending => line.push_str("  · pending"),
            DeliveryState::Failed => line.push_str("  · failed"),
            DeliveryState::Delivered => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::{
        group, Attachment, AttachmentKind, ConversationId, LocalId, MessageId, StoreStats,
        Timestamp,
    };

    const JAN_1_0900: u64 = 1_704_099_600_000;

    fn message(id: &str, sender: &str, receiver: &str, content: &str, offset: u64) -> Message {
        Message {
            id: MessageId::server(id),
            sender_id: UserId::from(sender),
            receiver_id: UserId::from(receiver),
            content: Some(content.to_string()),
            attachment: None,
            created_at: Timestamp::new(JAN_1_0900 + offset),
            delivery_state: DeliveryState::Delivered,
            is_local_echo: false,
            read: false,
            delivered: true,
        }
    }

    fn snapshot(messages: Vec<Message>, zone: FixedOffset, stats: StoreStats) -> TimelineSnapshot {
        TimelineSnapshot {
            conversation: ConversationId::new(UserId::from("alice"), UserId::from("bob")),
            buckets: group(messages, zone),
            stats,
        }
    }

    #[test]
    fn test_renders_runs_under_date_labels() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let pending = Message {
            id: MessageId::Local(LocalId::generate()),
            delivery_state: DeliveryState::Pending,
            is_local_echo: true,
            ..message("x", "alice", "bob", "on my way", 6 * 60_000)
        };
        let snap = snapshot(
            vec![
                message("1", "bob", "alice", "morning", 0),
                message("2", "bob", "alice", "you there?", 5 * 60_000),
                pending,
            ],
            utc,
            StoreStats {
                confirmed: 2,
                pending: 1,
                ..StoreStats::default()
            },
        );

        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let text = render_snapshot(
            &snap,
            &UserId::from("alice"),
            utc,
            today,
            &DisplayConfig::default(),
        );

        assert_eq!(
            text,
            "alice↔bob  (3 messages, 1 pending)\n\
             \x20 Today\n\
             \x20   bob\n\
             \x20     09:00  morning\n\
             \x20     09:05  you there?\n\
             \x20   alice (you)\n\
             \x20     09:06  on my way  · pending\n"
        );
    }

    #[test]
    fn test_attachment_only_message_shows_kind() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let photo = Message {
            content: None,
            attachment: Some(Attachment {
                url: "https://cdn.example.com/a.png".into(),
                kind: AttachmentKind::Image,
            }),
            ..message("1", "bob", "alice", "", 0)
        };

        let line = render_message(&photo, utc, &DisplayConfig::default());
        assert_eq!(
            line,
            format!("09:00  [{}] https://cdn.example.com/a.png", AttachmentKind::Image)
        );
    }

    #[test]
    fn test_times_follow_viewer_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let line = render_message(
            &message("1", "bob", "alice", "late", 0),
            tokyo,
            &DisplayConfig::default(),
        );
        assert_eq!(line, "18:00  late");
    }
}
