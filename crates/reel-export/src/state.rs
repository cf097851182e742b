use std::fmt;

/// Lifecycle of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Configuring,
    /// Working on the given frame index.
    Running(u64),
    Flushing,
    Finalized,
    Failed(String),
}

impl ExportState {
    /// Finalized or Failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Finalized | ExportState::Failed(_))
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportState::Idle => write!(f, "idle"),
            ExportState::Configuring => write!(f, "configuring"),
            ExportState::Running(i) => write!(f, "running (frame {})", i),
            ExportState::Flushing => write!(f, "flushing"),
            ExportState::Finalized => write!(f, "finalized"),
            ExportState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
