//! Runtime configuration from environment variables.
//!
//! Every variable has a default; a value that is present but malformed is a startup error.

use crate::models::{Amount, TournamentSettings, MAX_PERIOD_SECS};
use std::path::PathBuf;
use std::time::Duration;

/// Which contestants are queued when a tournament opens.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EntryRule {
    /// Every contestant that has an owner.
    #[default]
    Everyone,
    /// Only contestants whose owner holds at least this balance.
    Holders { min_balance: Amount },
}

impl std::str::FromStr for EntryRule {
    type Err = String;

    /// `everyone` or `holders:<min balance>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("everyone") {
            return Ok(EntryRule::Everyone);
        }
        match s.split_once(':') {
            Some((rule, min)) if rule.eq_ignore_ascii_case("holders") => min
                .trim()
                .parse()
                .map(|min_balance| EntryRule::Holders { min_balance })
                .map_err(|_| format!("invalid holders minimum: {:?}", min)),
            _ => Err(format!("unknown entry rule: {:?}", s)),
        }
    }
}

/// A variable is present but cannot be parsed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    pub host: String,
    pub port: u16,
    /// Headerless `hp,attack,defense,intellect,special` rows, id 1 first.
    pub stats_path: PathBuf,
    /// Headerless `id,owner` rows seeding the in-memory ledger.
    pub owners_path: PathBuf,
    pub pool_balance: Amount,
    pub settings: TournamentSettings,
    pub entry_rule: EntryRule,
    /// Upper bound on every external call.
    pub call_timeout: Duration,
    /// How often the scheduler checks the timer.
    pub poll_interval: Duration,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            stats_path: PathBuf::from("data/stats.csv"),
            owners_path: PathBuf::from("data/owners.csv"),
            pool_balance: 0,
            settings: TournamentSettings::default(),
            entry_rule: EntryRule::Everyone,
            call_timeout: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(variable) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError {
                variable,
                message: format!("{} ({:?})", e, raw),
            }),
    }
}

/// Round and registration period must both fit within [`MAX_PERIOD_SECS`].
fn check_periods(settings: &TournamentSettings) -> Result<(), ConfigError> {
    if settings.round_duration_secs > MAX_PERIOD_SECS {
        return Err(ConfigError {
            variable: "ARENA_ROUND_SECS",
            message: format!(
                "must be at most {} seconds, got {}",
                MAX_PERIOD_SECS, settings.round_duration_secs
            ),
        });
    }
    let queue = settings
        .round_duration_secs
        .checked_mul(u64::from(settings.queue_multiplier));
    if queue.map_or(true, |secs| secs > MAX_PERIOD_SECS) {
        return Err(ConfigError {
            variable: "ARENA_QUEUE_MULTIPLIER",
            message: format!(
                "registration period of {} x {} seconds exceeds {} seconds",
                settings.queue_multiplier, settings.round_duration_secs, MAX_PERIOD_SECS
            ),
        });
    }
    Ok(())
}

impl ArenaConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read from any name -> value lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut settings = defaults.settings;
        if let Some(v) = parse(&lookup, "ARENA_ROUND_SECS")? {
            settings.round_duration_secs = v;
        }
        if let Some(v) = parse(&lookup, "ARENA_QUEUE_MULTIPLIER")? {
            settings.queue_multiplier = v;
        }
        if let Some(v) = parse(&lookup, "ARENA_SURVIVOR_THRESHOLD")? {
            settings.survivor_threshold = v;
        }
        if let Some(v) = parse(&lookup, "ARENA_MATCH_ATTEMPTS")? {
            settings.match_attempts = v;
        }
        check_periods(&settings)?;

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            stats_path: lookup("ARENA_STATS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.stats_path),
            owners_path: lookup("ARENA_OWNERS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.owners_path),
            pool_balance: parse(&lookup, "ARENA_POOL_BALANCE")?.unwrap_or(defaults.pool_balance),
            settings,
            entry_rule: parse(&lookup, "ARENA_ENTRY_RULE")?.unwrap_or(defaults.entry_rule),
            call_timeout: parse(&lookup, "ARENA_CALL_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            poll_interval: parse(&lookup, "ARENA_POLL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        })
    }
}
