//! Shared types for the log lifecycle and the pipeline queues.

use anyhow::{Result, bail};
use std::fmt;

/// Where a log file is in its lifecycle. Moves forward only: Unclaimed → Claimed → Finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Unclaimed,
    Claimed,
    Finalized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Unclaimed => "unclaimed",
            LifecycleState::Claimed => "claimed",
            LifecycleState::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// A log file known to a [`LogSource`](crate::source::LogSource).
///
/// `id` is the key the owning strategy uses for the file in its current state. Under the
/// moving strategy the key changes on claim (the object now lives under the processing prefix),
/// so always finalize with the `LogFile` returned by the claim, not the candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFile {
    pub id: String,
    pub state: LifecycleState,
}

impl LogFile {
    /// A listed file that nobody has claimed yet.
    pub fn candidate(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: LifecycleState::Unclaimed,
        }
    }

    /// Unclaimed → Claimed, possibly under a new key. Only strategies call this after a
    /// successful exclusive claim.
    pub fn into_claimed(self, id: impl Into<String>) -> Result<Self> {
        if self.state != LifecycleState::Unclaimed {
            bail!("cannot claim {}: file is {}", self.id, self.state);
        }
        Ok(Self {
            id: id.into(),
            state: LifecycleState::Claimed,
        })
    }

    /// Claimed → Finalized.
    pub fn into_finalized(self) -> Result<Self> {
        if self.state != LifecycleState::Claimed {
            bail!("cannot finalize {}: file is {}", self.id, self.state);
        }
        Ok(Self {
            state: LifecycleState::Finalized,
            ..self
        })
    }

    pub fn is_claimed(&self) -> bool {
        self.state == LifecycleState::Claimed
    }
}

/// Result of a claim attempt. Backend failures are the `Err` side of the surrounding `Result`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This process now owns the file.
    Claimed(LogFile),
    /// Another run or instance got there first. Not an error; skip the file.
    AlreadyClaimed,
}

/// One fetched log file waiting to be parsed: claimed id plus its raw lines in order.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub file_id: String,
    pub lines: Vec<String>,
}
