//! Sweeper — runs both passes over the task collection and applies the result.
//!
//! Callers own the trigger (startup plus a periodic tick) and the collection;
//! the sweeper owns nothing but the clock, the id source and the day-boundary
//! timezone. One sweep:
//! - run the recurrence pass on the snapshot, apply it
//! - run the deferral pass on the updated snapshot, apply it
//! - report one event per generated occurrence and per promotion

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::changes::apply_changes;
use crate::deferral::DeferralEngine;
use crate::ports::{Clock, IdGenerator};
use crate::recurrence::RecurrenceEngine;
use crate::task::Task;

/// What a caller may want to surface to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SweepEvent {
    OccurrenceGenerated {
        source_id: String,
        occurrence_id: String,
        title: String,
    },
    TaskPromoted {
        task_id: String,
        title: String,
    },
}

impl fmt::Display for SweepEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepEvent::OccurrenceGenerated { title, .. } => {
                write!(f, "New occurrence of recurring task: {title}")
            }
            SweepEvent::TaskPromoted { title, .. } => {
                write!(f, "Moved to your list (due tomorrow): {title}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub at: DateTime<Utc>,
    pub events: Vec<SweepEvent>,
    /// Changes that actually landed, per kind.
    pub inserted: usize,
    pub advanced: usize,
    pub promoted: usize,
}

impl SweepReport {
    /// Nothing changed.
    pub fn is_quiet(&self) -> bool {
        self.inserted == 0 && self.advanced == 0 && self.promoted == 0
    }
}

pub struct Sweeper<Z: TimeZone, C: Clock, G: IdGenerator> {
    recurrence: RecurrenceEngine<Z>,
    deferral: DeferralEngine<Z>,
    clock: C,
    ids: G,
}

impl<Z: TimeZone, C: Clock, G: IdGenerator> Sweeper<Z, C, G> {
    pub fn new(tz: Z, clock: C, ids: G) -> Self {
        Self {
            recurrence: RecurrenceEngine::new(tz.clone()),
            deferral: DeferralEngine::new(tz),
            clock,
            ids,
        }
    }

    pub fn sweep(&mut self, tasks: &mut Vec<Task>) -> SweepReport {
        let now = self.clock.now();
        self.sweep_at(tasks, now)
    }

    pub fn sweep_at(&mut self, tasks: &mut Vec<Task>, now: DateTime<Utc>) -> SweepReport {
        let mut events = Vec::new();
        let mut inserted = 0;
        let mut advanced = 0;

        let recurrence = self.recurrence.run(tasks, now, &mut self.ids);
        for occ in recurrence.occurrences {
            let event = SweepEvent::OccurrenceGenerated {
                source_id: occ.source_id.clone(),
                occurrence_id: occ.task.id.clone(),
                title: occ.source_title.clone(),
            };
            // Both halves or neither.
            let [advance, insert] = occ.into_changes();
            if apply_changes(tasks, [insert]) == 1 {
                inserted += 1;
                advanced += apply_changes(tasks, [advance]);
                events.push(event);
            }
        }

        let deferral = self.deferral.run(tasks, now);
        events.extend(deferral.promotions.iter().map(|p| SweepEvent::TaskPromoted {
            task_id: p.task_id.clone(),
            title: p.title.clone(),
        }));
        let promoted = apply_changes(tasks, deferral.into_changes());

        let report = SweepReport {
            at: now,
            events,
            inserted,
            advanced,
            promoted,
        };
        tracing::debug!(
            at = %now,
            inserted = report.inserted,
            promoted = report.promoted,
            "sweep finished"
        );
        report
    }
}
