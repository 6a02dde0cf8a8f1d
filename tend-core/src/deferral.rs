//! Deferral pass: moves "for later" tasks back onto the primary list when
//! their deadline is a day away.
//!
//! The trigger window is exactly the local calendar day before the deadline's
//! day. It is a membership test on `now`, not a "deadline <= tomorrow" test: a
//! window that passes without a run never promotes retroactively, so whatever
//! drives this pass must run at least once a day.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::changes::TaskChange;
use crate::task::Task;
use crate::time::DayBounds;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub task_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeferralPass {
    pub promotions: Vec<Promotion>,
}

impl DeferralPass {
    pub fn is_empty(&self) -> bool {
        self.promotions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.promotions.len()
    }

    pub fn promoted_ids(&self) -> impl Iterator<Item = &str> {
        self.promotions.iter().map(|p| p.task_id.as_str())
    }

    pub fn into_changes(self) -> Vec<TaskChange> {
        self.promotions
            .into_iter()
            .map(|p| TaskChange::Promote { task_id: p.task_id })
            .collect()
    }
}

/// Promotes deferred tasks whose deadline falls on the next local day.
#[derive(Debug, Clone)]
pub struct DeferralEngine<Z: TimeZone> {
    tz: Z,
}

impl<Z: TimeZone> DeferralEngine<Z> {
    pub fn new(tz: Z) -> Self {
        Self { tz }
    }

    /// The promotion window for a deadline: the whole local day before it.
    pub fn window(&self, deadline: DateTime<Utc>) -> Option<DayBounds> {
        let day_before = deadline.with_timezone(&self.tz).date_naive().pred_opt()?;
        Some(DayBounds::of_date(day_before, &self.tz))
    }

    pub fn run(&self, tasks: &[Task], now: DateTime<Utc>) -> DeferralPass {
        let promotions = tasks
            .iter()
            .filter(|t| t.is_for_later)
            .filter_map(|t| {
                let deadline = t.deadline?;
                let window = self.window(deadline)?;
                if !window.contains(now) {
                    return None;
                }
                tracing::info!(task_id = %t.id, deadline = %deadline, "promoting deferred task");
                Some(Promotion {
                    task_id: t.id.clone(),
                    title: t.title.clone(),
                })
            })
            .collect();
        DeferralPass { promotions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use chrono_tz::Tz;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn deferred(deadline: DateTime<Utc>) -> Task {
        Task::new("later-1", "file taxes", at(1, 0, 0))
            .with_deadline(deadline)
            .for_later()
    }

    #[test]
    fn window_is_whole_day_before_deadline() {
        let engine = DeferralEngine::new(Utc);
        let w = engine.window(at(10, 17, 30)).unwrap();
        assert_eq!(w.start, at(9, 0, 0));
        assert_eq!(w.next_start, at(10, 0, 0));
    }

    #[test]
    fn promotes_in_the_last_millisecond_of_the_window() {
        let engine = DeferralEngine::new(Utc);
        let tasks = vec![deferred(at(10, 12, 0))];
        let just_before_midnight = at(10, 0, 0) - Duration::microseconds(500);
        assert_eq!(engine.run(&tasks, just_before_midnight).len(), 1);
        assert_eq!(engine.run(&tasks, at(10, 0, 0) - Duration::nanoseconds(1)).len(), 1);
    }

    #[test]
    fn promotes_only_inside_window() {
        let engine = DeferralEngine::new(Utc);
        let tasks = vec![deferred(at(10, 0, 0))];

        assert_eq!(engine.run(&tasks, at(9, 0, 0)).len(), 1);
        assert_eq!(engine.run(&tasks, at(9, 23, 59)).len(), 1);
        assert!(engine.run(&tasks, at(8, 23, 59)).is_empty());
        assert!(engine.run(&tasks, at(10, 0, 0)).is_empty());
    }

    #[test]
    fn ignores_active_and_undated_tasks() {
        let engine = DeferralEngine::new(Utc);
        let mut active = deferred(at(10, 0, 0));
        active.is_for_later = false;
        let undated = Task::new("later-2", "someday", at(1, 0, 0)).for_later();
        assert!(engine.run(&[active, undated], at(9, 12, 0)).is_empty());
    }

    #[test]
    fn window_uses_local_days() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        let engine = DeferralEngine::new(tz);
        // Deadline is local 2024-03-10 (18:00 UTC = 13:00 CDT).
        let tasks = vec![deferred(at(10, 18, 0))];
        // 2024-03-10 03:00 UTC is still 2024-03-09 21:00 CST: inside the window.
        assert_eq!(engine.run(&tasks, at(10, 3, 0)).len(), 1);
        // 2024-03-09 05:30 UTC is 2024-03-08 23:30 CST: too early.
        assert!(engine.run(&tasks, at(9, 5, 30)).is_empty());
    }

    #[test]
    fn changes_flip_the_flag() {
        let engine = DeferralEngine::new(Utc);
        let pass = engine.run(&[deferred(at(10, 0, 0))], at(9, 14, 0));
        assert_eq!(pass.promoted_ids().collect::<Vec<_>>(), vec!["later-1"]);
        assert_eq!(
            pass.into_changes(),
            vec![TaskChange::Promote {
                task_id: "later-1".into(),
            }]
        );
    }
}
