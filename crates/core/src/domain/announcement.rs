use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque handle to a posted Slack message (the message `ts`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the roster announcement for `target_date` was posted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    pub target_date: NaiveDate,
    pub channel_id: String,
    pub message_ref: MessageRef,
}
