//! Matching domain module.
//!
//! Value objects and the session aggregate behind interest-based pairing:
//!
//! - `InterestSet` - normalized interest tags and overlap computation
//! - `WaitingEntry` - an identity waiting in the queue
//! - `MatchSession` - the two-party session and its Matched → Active → Completed lifecycle
//! - `MatchNotification` / `TimerEvent` - what participants and timers emit

mod entry;
mod errors;
mod interests;
mod notification;
mod rating;
mod session;
mod status;

pub use entry::WaitingEntry;
pub use errors::{MatchError, MatchOutcome};
pub use interests::InterestSet;
pub use notification::{MatchFound, MatchNotification, PartnerProfile, TimerEvent};
pub use rating::Rating;
pub use session::{billed_minutes, MatchSession, DEFAULT_BILLED_MINUTES};
pub use status::MatchSessionStatus;
