//! WaitingEntry - one identity waiting for a partner.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::InterestSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingEntry {
    pub user_id: UserId,
    pub interests: InterestSet,
    pub enqueued_at: Timestamp,
}

impl WaitingEntry {
    pub fn new(user_id: UserId, interests: InterestSet) -> Self {
        Self {
            user_id,
            interests,
            enqueued_at: Timestamp::now(),
        }
    }
}
