#![deny(missing_docs)]
//! Library form of kindling

/// User commands: create, delete and list clusters.
pub mod commands;
/// Kindling configuration.
pub mod config;
/// Documents that may hold a Kind cluster config.
pub mod document;
/// Traits the embedding UI implements.
pub mod host;
/// Client for the `kind` binary.
pub mod kind;
/// Events and result types shared by everything else.
pub mod output;
/// Turns event streams into progress and final results.
pub mod progress;
/// Spawns processes and tracks their output.
pub mod tracker;
/// Console implementations of the host traits.
pub mod ui;
pub mod wizard;

pub use crate::config::*;
pub use crate::kind::*;
pub use crate::output::*;
pub use crate::ui::*;
