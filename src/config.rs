use chrono::{NaiveDate, Offset, TimeZone};
use chrono_tz::Tz;
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_SESSION_TABLE: &str = "Gamegoo_Current_Members";
pub const DEFAULT_HISTORY_TABLE: &str = "Gamegoo_Work_Time_History";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Seoul;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("WORK_CHANNEL_ID must be a non-zero channel id, got {0:?}")]
    InvalidChannel(String),

    #[error("WORK_TIMEZONE {0:?} is not a known IANA timezone")]
    UnknownTimezone(String),

    #[error("WORK_TIMEZONE {0:?} observes daylight saving; use a fixed-offset zone")]
    VariableOffsetTimezone(String),

    #[error("MEMBER_ROSTER entry {0:?} is not of the form name=handle")]
    InvalidRosterEntry(String),
}

/// Display names for member handles. Only used to label log lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    names: HashMap<String, String>,
}

impl Roster {
    /// Parses `name=handle` pairs separated by commas.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut names = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, handle) = entry
                .split_once('=')
                .map(|(n, h)| (n.trim(), h.trim()))
                .filter(|(n, h)| !n.is_empty() && !h.is_empty())
                .ok_or_else(|| ConfigError::InvalidRosterEntry(entry.to_string()))?;
            names.insert(handle.to_string(), name.to_string());
        }
        Ok(Self { names })
    }

    pub fn label(&self, handle: &str) -> String {
        match self.names.get(handle) {
            Some(name) => format!("{name} ({handle})"),
            None => handle.to_string(),
        }
    }
}

// Wall-clock arithmetic is only exact when the offset never moves.
fn has_fixed_offset(tz: Tz) -> bool {
    let offset_at = |month| {
        NaiveDate::from_ymd_opt(2024, month, 15)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .map(|utc| tz.offset_from_utc_datetime(&utc).fix())
    };
    offset_at(1) == offset_at(7)
}

pub struct Config {
    pub discord_token: String,
    pub work_channel_id: u64,
    pub aws_region: Option<String>,
    pub session_table: String,
    pub history_table: String,
    pub timezone: Tz,
    pub roster: Roster,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let raw_channel = get("WORK_CHANNEL_ID").ok_or(ConfigError::Missing("WORK_CHANNEL_ID"))?;
        let work_channel_id = raw_channel
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .ok_or(ConfigError::InvalidChannel(raw_channel))?;

        let timezone = match get("WORK_TIMEZONE") {
            Some(name) => {
                let tz = name
                    .parse::<Tz>()
                    .map_err(|_| ConfigError::UnknownTimezone(name.clone()))?;
                if !has_fixed_offset(tz) {
                    return Err(ConfigError::VariableOffsetTimezone(name));
                }
                tz
            }
            None => DEFAULT_TIMEZONE,
        };

        let roster = match get("MEMBER_ROSTER") {
            Some(raw) => Roster::parse(&raw)?,
            None => Roster::default(),
        };

        Ok(Self {
            discord_token,
            work_channel_id,
            aws_region: get("AWS_REGION"),
            session_table: get("CURRENT_ONLINE_TABLE")
                .unwrap_or_else(|| DEFAULT_SESSION_TABLE.to_string()),
            history_table: get("WORK_HISTORY_TABLE")
                .unwrap_or_else(|| DEFAULT_HISTORY_TABLE.to_string()),
            timezone,
            roster,
        })
    }
}
