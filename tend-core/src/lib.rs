//! tend-core: recurring-task generation and deferred-task promotion.

pub mod changes;
pub mod deferral;
pub mod ports;
pub mod recurrence;
pub mod sweep;
pub mod task;
pub mod time;

pub use changes::{TaskChange, apply_changes};
pub use deferral::{DeferralEngine, DeferralPass, Promotion};
pub use ports::{Clock, FixedClock, IdGenerator, SequentialIds, SystemClock, UuidGenerator};
pub use recurrence::{
    Cadence, Frequency, GeneratedOccurrence, RecurrenceEngine, RecurrencePass, RecurrenceRule,
};
pub use sweep::{SweepEvent, SweepReport, Sweeper};
pub use task::Task;
pub use time::{DayBounds, parse_local_deadline_to_utc, parse_timezone};
