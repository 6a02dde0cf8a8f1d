use anyhow::{Result, bail};
use chrono::Utc;
use chrono_tz::Tz;
use clap::Args;
use tend_core::{
    Cadence, IdGenerator, RecurrenceRule, Task, UuidGenerator, parse_local_deadline_to_utc,
};

use crate::config::Config;
use crate::state::TaskStore;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task title
    pub title: String,

    /// Deadline in local time: "YYYY-MM-DD" or "YYYY-MM-DD HH:MM"
    #[arg(long)]
    pub deadline: Option<String>,

    /// Put the task on the later list; it comes back the day before its deadline
    #[arg(long, default_value_t = false)]
    pub later: bool,

    /// Repeat rule: daily, every:3d, weekly:mon,thu, monthly:1,15
    #[arg(long)]
    pub repeat: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub context: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

pub fn add(args: AddArgs, cfg: &Config, store: &TaskStore) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        bail!("task title must not be empty");
    }

    let deadline = args
        .deadline
        .as_deref()
        .map(|d| parse_local_deadline_to_utc(d, &cfg.schedule.timezone))
        .transpose()?;
    let cadence = args.repeat.as_deref().map(Cadence::parse).transpose()?;
    if cadence.is_some() && deadline.is_none() {
        println!("Note: a repeating task needs a deadline before it generates occurrences.");
    }

    let now = Utc::now();
    let mut task = Task::new(UuidGenerator.next_id(), title, now);
    task.deadline = deadline;
    task.is_for_later = args.later;
    task.recurring = cadence.map(|c| RecurrenceRule::starting(c, deadline, now));
    task.project_id = args.project;
    task.context_id = args.context;
    task.notes = args.notes;

    let mut tasks = store.load()?;
    let line = describe(&task, &cfg.timezone()?);
    tasks.push(task);
    store.save(&tasks)?;

    println!("Added {line}");
    Ok(())
}

pub fn list(later: bool, all: bool, cfg: &Config, store: &TaskStore) -> Result<()> {
    let tz = cfg.timezone()?;
    let tasks = store.load()?;

    let shown: Vec<&Task> = tasks
        .iter()
        .filter(|t| all || (t.is_for_later == later && !t.completed))
        .collect();

    if shown.is_empty() {
        println!("{}", if later { "Nothing on the later list." } else { "No open tasks." });
        return Ok(());
    }
    for t in shown {
        println!("{}", describe(t, &tz));
    }
    Ok(())
}

pub fn complete(id: &str, store: &TaskStore) -> Result<()> {
    let mut tasks = store.load()?;
    let i = find_task(&tasks, id)?;
    tasks[i].completed = true;
    store.save(&tasks)?;
    println!("Completed: {}", tasks[i].title);
    Ok(())
}

/// Manual restore from the later list.
pub fn promote(id: &str, store: &TaskStore) -> Result<()> {
    let mut tasks = store.load()?;
    let i = find_task(&tasks, id)?;
    if !tasks[i].is_for_later {
        println!("Already on your list: {}", tasks[i].title);
        return Ok(());
    }
    tasks[i].is_for_later = false;
    store.save(&tasks)?;
    println!("Moved to your list: {}", tasks[i].title);
    Ok(())
}

/// Exact id, or a unique id prefix.
fn find_task(tasks: &[Task], id: &str) -> Result<usize> {
    if let Some(i) = tasks.iter().position(|t| t.id == id) {
        return Ok(i);
    }
    let matches: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.id.starts_with(id))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [i] => Ok(*i),
        [] => bail!("no task with id {id}"),
        _ => bail!("id prefix {id} matches {} tasks", matches.len()),
    }
}

fn describe(t: &Task, tz: &Tz) -> String {
    let mut line = format!(
        "[{}] {}  {}",
        if t.completed { "x" } else { " " },
        short_id(&t.id),
        t.title
    );
    if let Some(d) = t.deadline {
        line.push_str(&format!("  due {}", d.with_timezone(tz).format("%Y-%m-%d %H:%M")));
    }
    if let Some(rule) = &t.recurring {
        line.push_str(&format!("  ({})", rule.cadence));
    }
    if t.is_for_later {
        line.push_str("  [later]");
    }
    line
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
