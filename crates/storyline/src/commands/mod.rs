//! Command handlers for the storyline CLI.

pub mod invoke;
pub mod library;
pub mod logging;

pub use invoke::*;
pub use library::*;
pub use logging::*;
