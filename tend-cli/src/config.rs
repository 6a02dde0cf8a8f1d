use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_tend_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// IANA timezone that defines where a day starts and ends.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Seconds between sweeps in `tend watch`. Must stay well under a day or
    /// deferred tasks can miss their promotion window.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Relative paths resolve against the tend home.
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

fn default_tick_seconds() -> u64 {
    60
}

fn default_tasks_file() -> String {
    "tasks.json".to_string()
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_seconds: default_tick_seconds(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            tasks_file: default_tasks_file(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        tend_core::parse_timezone(&self.schedule.timezone).context("config [schedule].timezone")
    }

    pub fn tasks_path(&self, home: &Path) -> PathBuf {
        let p = PathBuf::from(&self.store.tasks_file);
        if p.is_absolute() { p } else { home.join(p) }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tend_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let cfg = Config::default();
    save_config(&cfg)?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("# {}", config_path()?.display());
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}
