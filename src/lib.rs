//! AR Shield - a marker-tracked reaction game
//!
//! Core modules:
//! - `sim`: Marker poses, the board and the game mode state machine
//! - `pattern`: Pattern template loading and id registry
//! - `settings`: Construction-time configuration and calibration values
//! - `error`: Setup and configuration failures

pub mod error;
pub mod pattern;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, PatternError, SetupError};
pub use pattern::{PatternId, PatternRegistry};
pub use settings::{Difficulty, GameRules, ObjectivePolicy, Settings};
