//! Core types and utilities for the garden ecosystem simulation.

pub mod catalog;
pub mod config;
pub mod error;
pub mod season;
pub mod types;

pub use catalog::*;
pub use config::*;
pub use error::{format_remaining, Error, PlacementError, RejectReason, Result};
pub use season::*;
pub use types::*;
