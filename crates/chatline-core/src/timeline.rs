//! Timeline grouping
//!
//! Projects a conversation's visible messages into calendar-day buckets and,
//! within each bucket, runs of consecutive messages from one sender. The
//! projection is recomputed from scratch on every change and never stored.

use chrono::{Days, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::message::Message;
use crate::types::{Timestamp, UserId};

/// Maximal run of consecutive messages from one sender within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderRun {
    pub sender_id: UserId,
    pub messages: SmallVec<[Message; 4]>,
}

impl SenderRun {
    fn start(message: Message) -> Self {
        let mut messages = SmallVec::new();
        let sender_id = message.sender_id.clone();
        messages.push(message);
        Self {
            sender_id,
            messages,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Timestamp of the last message, used for the run footer
    pub fn last_at(&self) -> Option<Timestamp> {
        self.messages.last().map(|message| message.created_at)
    }
}

/// One calendar day in the viewer's zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBucket {
    pub date_key: NaiveDate,
    pub runs: Vec<SenderRun>,
}

impl DateBucket {
    /// Header text relative to `today`
    pub fn label(&self, today: NaiveDate) -> String {
        if self.date_key == today {
            "Today".to_string()
        } else if today.checked_sub_days(Days::new(1)) == Some(self.date_key) {
            "Yesterday".to_string()
        } else {
            self.date_key.format("%A, %B %-d, %Y").to_string()
        }
    }

    pub fn message_count(&self) -> usize {
        self.runs.iter().map(SenderRun::len).sum()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.runs.iter().flat_map(|run| run.messages.iter())
    }
}

/// Calendar date of a timestamp in `zone`
pub fn date_in_zone(timestamp: Timestamp, zone: FixedOffset) -> NaiveDate {
    timestamp.to_utc().with_timezone(&zone).date_naive()
}

/// Group messages into date buckets and sender runs
///
/// Messages are stable-sorted by `created_at`, so equal timestamps keep the
/// order they were passed in.
pub fn group(messages: impl IntoIterator<Item = Message>, zone: FixedOffset) -> Vec<DateBucket> {
    let mut ordered: Vec<Message> = messages.into_iter().collect();
    ordered.sort_by_key(|message| message.created_at);

    let mut buckets: Vec<DateBucket> = Vec::new();
    for message in ordered {
        let date_key = date_in_zone(message.created_at, zone);

        if buckets.last().map(|bucket| bucket.date_key) != Some(date_key) {
            buckets.push(DateBucket {
                date_key,
                runs: Vec::new(),
            });
        }
        let Some(bucket) = buckets.last_mut() else {
            continue;
        };

        match bucket.runs.last_mut() {
            Some(run) if run.sender_id == message.sender_id => run.messages.push(message),
            _ => bucket.runs.push(SenderRun::start(message)),
        }
    }

    buckets
}

/// Grouper bound to a viewer zone
#[derive(Debug, Clone, Copy)]
pub struct TimelineGrouper {
    zone: FixedOffset,
}

impl TimelineGrouper {
    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub fn group(&self, messages: impl IntoIterator<Item = Message>) -> Vec<DateBucket> {
        group(messages, self.zone)
    }

    /// Today's date in the viewer's zone, for bucket labels
    pub fn today(&self, now: Timestamp) -> NaiveDate {
        date_in_zone(now, self.zone)
    }
}
