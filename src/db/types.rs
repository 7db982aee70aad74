use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "tasktype", rename_all = "lowercase")]
pub(crate) enum TaskKind {
    Skips,
    Noises,
}

impl TaskKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TaskKind::Skips => "skips",
            TaskKind::Noises => "noises",
        }
    }
}

/// Durable lifecycle of a submission. `Pending` transitions exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "submissionstatus")]
pub(crate) enum SubmissionStatus {
    Pending,
    Success,
    Failed,
}

impl SubmissionStatus {
    #[cfg(test)]
    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Success => "Success",
            SubmissionStatus::Failed => "Failed",
        }
    }
}
