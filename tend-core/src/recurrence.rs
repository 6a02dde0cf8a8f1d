//! Recurrence rules and the pass that turns them into new task occurrences.
//!
//! For every task carrying a rule, decide whether a new occurrence is due at
//! `now`; if so, emit a copy of the task with the next deadline and advance the
//! source rule's `last_generated` marker. At most one occurrence per source per
//! pass: the pass is expected to run at least once per relevant day, so there
//! is no backlog catch-up.
//!
//! Due conditions:
//! - daily: whole days since `last_generated` >= interval
//! - weekly: today's local weekday is in the set, and nothing generated yet today
//! - monthly: today's local day-of-month is in the set, and nothing generated yet today
//!
//! Malformed rules (interval 0, empty day sets) are simply never due.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::changes::TaskChange;
use crate::ports::IdGenerator;
use crate::task::Task;
use crate::time::{
    add_local_days, add_local_months, local_day_of_month, local_weekday_from_sunday, start_of_day,
    whole_days_between,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        })
    }
}

const WEEKDAY_LABELS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
const WEEKDAY_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Which days a rule fires on. Only the field matching the frequency exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "snake_case")]
pub enum Cadence {
    /// Every `interval` days.
    Daily {
        #[serde(default = "default_interval")]
        interval: u32,
    },
    /// Weekdays, 0 = Sunday .. 6 = Saturday.
    Weekly {
        #[serde(default)]
        days_of_week: BTreeSet<u8>,
    },
    /// Days of the month, 1..=31.
    Monthly {
        #[serde(default)]
        days_of_month: BTreeSet<u32>,
    },
}

fn default_interval() -> u32 {
    1
}

impl Cadence {
    pub fn daily() -> Self {
        Cadence::Daily { interval: 1 }
    }

    pub fn every_n_days(interval: u32) -> Self {
        Cadence::Daily { interval }
    }

    pub fn weekly(days: impl IntoIterator<Item = u8>) -> Self {
        Cadence::Weekly {
            days_of_week: days.into_iter().collect(),
        }
    }

    pub fn monthly(days: impl IntoIterator<Item = u32>) -> Self {
        Cadence::Monthly {
            days_of_month: days.into_iter().collect(),
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Cadence::Daily { .. } => Frequency::Daily,
            Cadence::Weekly { .. } => Frequency::Weekly,
            Cadence::Monthly { .. } => Frequency::Monthly,
        }
    }

    /// Parse a rule label.
    ///
    /// Formats:
    /// - `"daily"`, `"daily:3"`, `"every:3d"`
    /// - `"weekly:mon,wed,fri"` (numbers 0..=6 with 0 = Sunday also accepted)
    /// - `"monthly:1,15"`
    pub fn parse(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        if lower == "daily" {
            return Ok(Self::daily());
        }
        if let Some(rest) = lower
            .strip_prefix("daily:")
            .or_else(|| lower.strip_prefix("every:").map(|r| r.strip_suffix('d').unwrap_or(r)))
        {
            let n: u32 = rest
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid day interval: {rest}"))?;
            if n == 0 {
                bail!("day interval must be at least 1");
            }
            return Ok(Self::every_n_days(n));
        }
        if let Some(rest) = lower.strip_prefix("weekly:") {
            let days = rest
                .split(',')
                .map(|d| parse_weekday(d.trim()))
                .collect::<Result<BTreeSet<u8>>>()?;
            return Ok(Cadence::Weekly { days_of_week: days });
        }
        if let Some(rest) = lower.strip_prefix("monthly:") {
            let days = rest
                .split(',')
                .map(|d| -> Result<u32> {
                    let d = d.trim();
                    let day: u32 = d
                        .parse()
                        .map_err(|_| anyhow::anyhow!("invalid day of month: {d}"))?;
                    if !(1..=31).contains(&day) {
                        bail!("day of month out of range: {day}");
                    }
                    Ok(day)
                })
                .collect::<Result<BTreeSet<u32>>>()?;
            return Ok(Cadence::Monthly { days_of_month: days });
        }
        bail!("unrecognized repeat rule: {s} (try daily, every:3d, weekly:mon,fri, monthly:1,15)")
    }

    /// Whether a new occurrence is due at `now`, given the last generation time.
    pub fn is_due<Z: TimeZone>(
        &self,
        last_generated: DateTime<Utc>,
        now: DateTime<Utc>,
        tz: &Z,
    ) -> bool {
        match self {
            Cadence::Daily { interval } => {
                *interval > 0 && whole_days_between(last_generated, now) >= i64::from(*interval)
            }
            Cadence::Weekly { days_of_week } => {
                days_of_week.contains(&local_weekday_from_sunday(now, tz))
                    && last_generated < start_of_day(now, tz)
            }
            Cadence::Monthly { days_of_month } => {
                days_of_month.contains(&local_day_of_month(now, tz))
                    && last_generated < start_of_day(now, tz)
            }
        }
    }

    /// Deadline of the next occurrence, projected forward from the current one.
    pub fn next_deadline<Z: TimeZone>(
        &self,
        deadline: DateTime<Utc>,
        tz: &Z,
    ) -> Option<DateTime<Utc>> {
        match self {
            Cadence::Daily { interval } => add_local_days(deadline, u64::from(*interval), tz),
            Cadence::Weekly { .. } => add_local_days(deadline, 7, tz),
            Cadence::Monthly { .. } => add_local_months(deadline, 1, tz),
        }
    }
}

fn parse_weekday(s: &str) -> Result<u8> {
    if let Some(i) = WEEKDAY_LABELS
        .iter()
        .zip(WEEKDAY_NAMES)
        .position(|(label, name)| s == *label || s == name)
    {
        return Ok(i as u8);
    }
    match s.parse::<u8>() {
        Ok(n) if n <= 6 => Ok(n),
        _ => bail!("unknown day: {s}"),
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Daily { interval: 1 } => f.write_str("daily"),
            Cadence::Daily { interval } => write!(f, "every:{interval}d"),
            Cadence::Weekly { days_of_week } => {
                let names: Vec<&str> = days_of_week
                    .iter()
                    .map(|d| WEEKDAY_LABELS.get(*d as usize).copied().unwrap_or("?"))
                    .collect();
                write!(f, "weekly:{}", names.join(","))
            }
            Cadence::Monthly { days_of_month } => {
                let days: Vec<String> = days_of_month.iter().map(u32::to_string).collect();
                write!(f, "monthly:{}", days.join(","))
            }
        }
    }
}

/// A recurrence rule owned by exactly one task. Replaced wholesale on edit;
/// the pass only ever moves `last_generated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(flatten)]
    pub cadence: Cadence,
    pub last_generated: DateTime<Utc>,
}

impl RecurrenceRule {
    pub fn new(cadence: Cadence, last_generated: DateTime<Utc>) -> Self {
        Self {
            cadence,
            last_generated,
        }
    }

    /// Rule for a freshly created task: anchored on its deadline, or on `now`
    /// when it has none.
    pub fn starting(cadence: Cadence, deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self::new(cadence, deadline.unwrap_or(now))
    }

    pub fn frequency(&self) -> Frequency {
        self.cadence.frequency()
    }
}

/// One source task that fired during a pass. The source update and the new
/// task travel together so a caller applies both or neither.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedOccurrence {
    pub source_id: String,
    pub source_title: String,
    /// New `last_generated` for the source rule.
    pub advance_to: DateTime<Utc>,
    pub task: Task,
}

impl GeneratedOccurrence {
    pub fn into_changes(self) -> [TaskChange; 2] {
        [
            TaskChange::AdvanceLastGenerated {
                task_id: self.source_id,
                at: self.advance_to,
            },
            TaskChange::Insert(self.task),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurrencePass {
    pub occurrences: Vec<GeneratedOccurrence>,
}

impl RecurrencePass {
    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn into_changes(self) -> Vec<TaskChange> {
        self.occurrences
            .into_iter()
            .flat_map(GeneratedOccurrence::into_changes)
            .collect()
    }
}

/// Generates due occurrences for recurring tasks. Day boundaries are taken in `tz`.
#[derive(Debug, Clone)]
pub struct RecurrenceEngine<Z: TimeZone> {
    tz: Z,
}

impl<Z: TimeZone> RecurrenceEngine<Z> {
    pub fn new(tz: Z) -> Self {
        Self { tz }
    }

    pub fn run(
        &self,
        tasks: &[Task],
        now: DateTime<Utc>,
        ids: &mut impl IdGenerator,
    ) -> RecurrencePass {
        let occurrences = tasks
            .iter()
            .filter_map(|task| self.occurrence_for(task, now, ids))
            .collect();
        RecurrencePass { occurrences }
    }

    fn occurrence_for(
        &self,
        task: &Task,
        now: DateTime<Utc>,
        ids: &mut impl IdGenerator,
    ) -> Option<GeneratedOccurrence> {
        let rule = task.recurring.as_ref()?;

        // Nothing to project forward from.
        let Some(deadline) = task.deadline else {
            tracing::debug!(
                task_id = %task.id,
                frequency = %rule.frequency(),
                "recurring task has no deadline; skipping"
            );
            return None;
        };

        if !rule.cadence.is_due(rule.last_generated, now, &self.tz) {
            return None;
        }

        let Some(next_deadline) = rule.cadence.next_deadline(deadline, &self.tz) else {
            tracing::debug!(task_id = %task.id, "next deadline out of range; skipping");
            return None;
        };

        let mut occurrence = task.clone();
        occurrence.id = ids.next_id();
        occurrence.completed = false;
        occurrence.created_at = now;
        occurrence.deadline = Some(next_deadline);
        occurrence.recurring = Some(RecurrenceRule::new(rule.cadence.clone(), now));

        tracing::info!(
            task_id = %task.id,
            occurrence_id = %occurrence.id,
            frequency = %rule.frequency(),
            deadline = %next_deadline,
            "generated occurrence"
        );

        Some(GeneratedOccurrence {
            source_id: task.id.clone(),
            source_title: task.title.clone(),
            advance_to: now,
            task: occurrence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SequentialIds;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn parse_labels() {
        assert_eq!(Cadence::parse("daily").unwrap(), Cadence::daily());
        assert_eq!(Cadence::parse("every:3d").unwrap(), Cadence::every_n_days(3));
        assert_eq!(Cadence::parse("daily:2").unwrap(), Cadence::every_n_days(2));
        assert_eq!(Cadence::parse("weekly:mon,fri").unwrap(), Cadence::weekly([1, 5]));
        assert_eq!(Cadence::parse("Weekly:Sunday,3").unwrap(), Cadence::weekly([0, 3]));
        assert_eq!(Cadence::parse("weekly:wednesday,sat").unwrap(), Cadence::weekly([3, 6]));
        assert_eq!(Cadence::parse("monthly:1,15").unwrap(), Cadence::monthly([1, 15]));
    }

    #[test]
    fn parse_rejects_bad_labels() {
        assert!(Cadence::parse("every:0d").is_err());
        assert!(Cadence::parse("weekly:funday").is_err());
        assert!(Cadence::parse("weekly:month").is_err());
        assert!(Cadence::parse("weekly:sunburn").is_err());
        assert!(Cadence::parse("weekly:mo").is_err());
        assert!(Cadence::parse("weekly:7").is_err());
        assert!(Cadence::parse("monthly:32").is_err());
        assert!(Cadence::parse("yearly").is_err());
    }

    #[test]
    fn labels_display_back() {
        for label in ["daily", "every:3d", "weekly:sun,wed", "monthly:1,31"] {
            assert_eq!(Cadence::parse(label).unwrap().to_string(), label);
        }
    }

    #[test]
    fn rule_serializes_with_frequency_tag() {
        let rule = RecurrenceRule::new(Cadence::weekly([1]), day(2024, 1, 1));
        let v = serde_json::to_value(&rule).unwrap();
        assert_eq!(v["frequency"], "weekly");
        assert_eq!(v["days_of_week"], serde_json::json!([1]));
        assert!(v.get("interval").is_none());
    }

    #[test]
    fn inactive_fields_are_ignored_on_read() {
        let json = r#"{
            "frequency": "monthly",
            "interval": 4,
            "days_of_week": [2],
            "days_of_month": [15],
            "last_generated": "2024-01-01T00:00:00Z"
        }"#;
        let rule: RecurrenceRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.cadence, Cadence::monthly([15]));
    }

    #[test]
    fn starting_rule_anchors_on_deadline_or_now() {
        let now = day(2024, 1, 5);
        let rule = RecurrenceRule::starting(Cadence::daily(), Some(day(2024, 1, 7)), now);
        assert_eq!(rule.last_generated, day(2024, 1, 7));
        let rule = RecurrenceRule::starting(Cadence::daily(), None, now);
        assert_eq!(rule.last_generated, now);
    }

    #[test]
    fn daily_interval_zero_is_never_due() {
        let last = day(2024, 1, 1);
        assert!(!Cadence::every_n_days(0).is_due(last, last + Duration::days(400), &Utc));
    }

    #[test]
    fn daily_counts_whole_elapsed_days() {
        let last = day(2024, 1, 1);
        let c = Cadence::every_n_days(2);
        assert!(!c.is_due(last, last + Duration::hours(47), &Utc));
        assert!(c.is_due(last, last + Duration::hours(48), &Utc));
    }

    #[test]
    fn weekly_and_monthly_empty_sets_are_inert() {
        let last = day(2023, 1, 1);
        let now = day(2024, 1, 8);
        assert!(!Cadence::weekly(std::iter::empty()).is_due(last, now, &Utc));
        assert!(!Cadence::monthly(std::iter::empty()).is_due(last, now, &Utc));
    }

    #[test]
    fn weekly_guard_is_start_of_today() {
        let c = Cadence::weekly([1]);
        let monday = day(2024, 1, 8);
        let midnight = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        assert!(c.is_due(midnight - Duration::milliseconds(1), monday, &Utc));
        assert!(!c.is_due(midnight, monday, &Utc));
    }

    #[test]
    fn task_without_deadline_never_generates() {
        let now = day(2024, 1, 8);
        let tasks = vec![
            Task::new("d", "journal", day(2023, 12, 1))
                .with_recurrence(RecurrenceRule::new(Cadence::daily(), day(2023, 12, 1))),
            Task::new("w", "review", day(2023, 12, 1))
                .with_recurrence(RecurrenceRule::new(Cadence::weekly([1]), day(2023, 12, 1))),
        ];
        let pass = RecurrenceEngine::new(Utc).run(&tasks, now, &mut SequentialIds::new("occ"));
        assert!(pass.is_empty());
    }

    #[test]
    fn occurrence_copies_fields_and_starts_fresh() {
        let now = day(2024, 1, 3);
        let mut source = Task::new("src", "water plants", day(2023, 11, 1))
            .with_deadline(day(2024, 1, 1))
            .with_project("home")
            .with_context("@house")
            .with_recurrence(RecurrenceRule::new(Cadence::daily(), day(2024, 1, 1)));
        source.completed = true;
        source.notes = Some("ferns only".into());

        let pass = RecurrenceEngine::new(Utc).run(
            std::slice::from_ref(&source),
            now,
            &mut SequentialIds::new("occ"),
        );
        assert_eq!(pass.len(), 1);
        let occ = &pass.occurrences[0];
        assert_eq!(occ.source_id, "src");
        assert_eq!(occ.source_title, "water plants");
        assert_eq!(occ.advance_to, now);

        let t = &occ.task;
        assert_eq!(t.id, "occ-1");
        assert!(!t.completed);
        assert_eq!(t.created_at, now);
        assert_eq!(t.deadline, Some(day(2024, 1, 2)));
        assert_eq!(t.project_id.as_deref(), Some("home"));
        assert_eq!(t.context_id.as_deref(), Some("@house"));
        assert_eq!(t.notes.as_deref(), Some("ferns only"));
        let rule = t.recurring.as_ref().unwrap();
        assert_eq!(rule.cadence, Cadence::daily());
        assert_eq!(rule.last_generated, now);
    }

    #[test]
    fn changes_pair_advance_with_insert() {
        let now = day(2024, 1, 3);
        let source = Task::new("src", "stretch", day(2024, 1, 1))
            .with_deadline(day(2024, 1, 1))
            .with_recurrence(RecurrenceRule::new(Cadence::daily(), day(2024, 1, 1)));
        let changes = RecurrenceEngine::new(Utc)
            .run(&[source], now, &mut SequentialIds::new("occ"))
            .into_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0],
            TaskChange::AdvanceLastGenerated {
                task_id: "src".into(),
                at: now,
            }
        );
        assert!(matches!(&changes[1], TaskChange::Insert(t) if t.id == "occ-1"));
    }
}
