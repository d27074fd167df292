use crate::clock::Timestamp;
use thiserror::Error;

/// A finished stretch of time inside the tracked channel. Never crosses a
/// local midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkInterval {
    pub id: String,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    /// Minutes, unrounded.
    pub duration: f64,
}

impl WorkInterval {
    fn new(id: &str, start_at: Timestamp, end_at: Timestamp) -> Self {
        Self {
            id: id.to_string(),
            start_at,
            end_at,
            duration: start_at.minutes_until(&end_at),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("interval for {id} ends at {end_at}, before it starts at {start_at}")]
    EndBeforeStart {
        id: String,
        start_at: Timestamp,
        end_at: Timestamp,
    },
}

/// Cuts `[start_at, end_at]` at the midnight following `start_at`.
///
/// An end exactly on that midnight still takes the two-record path and
/// yields a zero-minute second record. Spans longer than a day are cut only
/// once, at the first midnight.
pub fn split(
    id: &str,
    start_at: Timestamp,
    end_at: Timestamp,
) -> Result<Vec<WorkInterval>, SplitError> {
    if end_at < start_at {
        return Err(SplitError::EndBeforeStart {
            id: id.to_string(),
            start_at,
            end_at,
        });
    }

    match start_at.next_midnight() {
        Some(midnight) if end_at >= midnight => Ok(vec![
            WorkInterval::new(id, start_at, midnight),
            WorkInterval::new(id, midnight, end_at),
        ]),
        _ => Ok(vec![WorkInterval::new(id, start_at, end_at)]),
    }
}
