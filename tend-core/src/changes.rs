//! Field-level changes produced by the passes and applied by the store layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskChange {
    /// Move the source rule's `last_generated` marker.
    AdvanceLastGenerated { task_id: String, at: DateTime<Utc> },
    /// Flip `is_for_later` to false.
    Promote { task_id: String },
    /// Append a brand-new task.
    Insert(Task),
}

impl TaskChange {
    pub fn task_id(&self) -> &str {
        match self {
            TaskChange::AdvanceLastGenerated { task_id, .. } => task_id,
            TaskChange::Promote { task_id } => task_id,
            TaskChange::Insert(task) => &task.id,
        }
    }
}

/// Apply changes in order. Returns how many took effect; changes that point at
/// an unknown id, or an insert whose id already exists, are skipped.
pub fn apply_changes(
    tasks: &mut Vec<Task>,
    changes: impl IntoIterator<Item = TaskChange>,
) -> usize {
    let mut applied = 0;
    for change in changes {
        let task_id = change.task_id().to_string();
        match apply_one(tasks, change) {
            Ok(()) => applied += 1,
            Err(reason) => tracing::warn!(task_id = %task_id, reason, "skipped change"),
        }
    }
    applied
}

// Err carries the reason the change was skipped.
fn apply_one(tasks: &mut Vec<Task>, change: TaskChange) -> Result<(), &'static str> {
    match change {
        TaskChange::AdvanceLastGenerated { task_id, at } => {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or("no task with this id")?;
            let rule = task.recurring.as_mut().ok_or("task has no recurrence rule")?;
            rule.last_generated = at;
        }
        TaskChange::Promote { task_id } => {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or("no task with this id")?;
            task.is_for_later = false;
        }
        TaskChange::Insert(task) => {
            if tasks.iter().any(|t| t.id == task.id) {
                return Err("duplicate id");
            }
            tasks.push(task);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Cadence, RecurrenceRule};
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn applies_each_kind() {
        let mut tasks = vec![
            Task::new("r", "stretch", at(1))
                .with_recurrence(RecurrenceRule::new(Cadence::Daily { interval: 1 }, at(1))),
            Task::new("l", "taxes", at(1)).for_later(),
        ];
        let n = apply_changes(
            &mut tasks,
            vec![
                TaskChange::AdvanceLastGenerated {
                    task_id: "r".into(),
                    at: at(3),
                },
                TaskChange::Promote {
                    task_id: "l".into(),
                },
                TaskChange::Insert(Task::new("n", "stretch", at(3))),
            ],
        );
        assert_eq!(n, 3);
        assert_eq!(tasks[0].recurring.as_ref().unwrap().last_generated, at(3));
        assert!(!tasks[1].is_for_later);
        assert_eq!(tasks[2].id, "n");
    }

    #[test]
    fn skips_unknown_ids_and_duplicate_inserts() {
        let mut tasks = vec![Task::new("a", "one-off", at(1))];
        let n = apply_changes(
            &mut tasks,
            vec![
                TaskChange::Promote {
                    task_id: "missing".into(),
                },
                // "a" has no rule to advance.
                TaskChange::AdvanceLastGenerated {
                    task_id: "a".into(),
                    at: at(2),
                },
                TaskChange::Insert(Task::new("a", "dup", at(2))),
            ],
        );
        assert_eq!(n, 0);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "one-off");
    }

    #[test]
    fn skip_reasons_name_the_cause() {
        let mut tasks = vec![Task::new("a", "one-off", at(1))];
        assert_eq!(
            apply_one(&mut tasks, TaskChange::Insert(Task::new("a", "dup", at(2)))),
            Err("duplicate id")
        );
        let promote = TaskChange::Promote {
            task_id: "missing".into(),
        };
        assert_eq!(apply_one(&mut tasks, promote), Err("no task with this id"));
        let advance = TaskChange::AdvanceLastGenerated {
            task_id: "a".into(),
            at: at(2),
        };
        assert_eq!(apply_one(&mut tasks, advance), Err("task has no recurrence rule"));
        assert_eq!(tasks.len(), 1);
    }
}
