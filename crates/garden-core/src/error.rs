//! Error types for the simulation.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid position: ({x}, {y})")]
    InvalidPosition { x: i32, y: i32 },

    #[error("Placement rejected: {0}")]
    PlacementRejected(RejectReason),

    #[error("Placement cooldown active: {0:?} remaining")]
    CooldownActive(Duration),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Why a tile refused an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// The target layer already holds a living entity.
    LayerOccupied,
    /// The element needs more sunlight than the tile currently receives.
    InsufficientSunlight { required: f64, available: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::LayerOccupied => write!(f, "tile layer is occupied"),
            RejectReason::InsufficientSunlight {
                required,
                available,
            } => write!(
                f,
                "needs {:.0}% sunlight, tile has {:.0}%",
                required, available
            ),
        }
    }
}

/// Structured outcome of a failed placement, kept separate from [`Error`] so
/// callers can render the exact reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("Invalid position: ({x}, {y})")]
    InvalidPosition { x: i32, y: i32 },

    #[error("Cannot place element here: {0}")]
    Rejected(RejectReason),

    #[error("Next placement available in {}", format_remaining(*.remaining))]
    CooldownActive { remaining: Duration },
}

impl From<PlacementError> for Error {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::InvalidPosition { x, y } => Error::InvalidPosition { x, y },
            PlacementError::Rejected(reason) => Error::PlacementRejected(reason),
            PlacementError::CooldownActive { remaining } => Error::CooldownActive(remaining),
        }
    }
}

/// Format a remaining duration the way the placement timer shows it:
/// `"2h 5m"`, `"4m 2s"` or `"9s"`.
pub fn format_remaining(remaining: Duration) -> String {
    let seconds = remaining.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
