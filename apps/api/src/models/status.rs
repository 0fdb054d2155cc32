use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Processing state of a candidate's analysis.
///
/// `Pending` is set at creation. A run moves the candidate to `Analyzing`, then to
/// exactly one of the terminal states. A fresh trigger may restart from any
/// non-`Analyzing` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Analyzing,
    Completed,
    /// The run could not finish for a reason tied to its inputs (cancelled, job removed).
    Failed,
    /// Infrastructure failure (persistence, embedding runtime).
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Analyzing => "analyzing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            ProcessingStatus::Completed | ProcessingStatus::Failed | ProcessingStatus::Error => {
                true
            }
            ProcessingStatus::Pending | ProcessingStatus::Analyzing => false,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (self, next) {
            (Analyzing, Analyzing) => false,
            (Pending | Completed | Failed | Error, Analyzing) => true,
            (Analyzing, Completed | Failed | Error) => true,
            (_, Pending) => false,
            (Pending | Completed | Failed | Error, Completed | Failed | Error) => false,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "analyzing" => Ok(ProcessingStatus::Analyzing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            "error" => Ok(ProcessingStatus::Error),
            other => Err(anyhow::anyhow!("unknown processing status '{other}'")),
        }
    }
}
