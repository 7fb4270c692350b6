//! Match simulation
//!
//! Marker geometry and the game rules built on it. Everything here is
//! synchronous and single-threaded:
//! - Detections are applied to the board before the rules read it
//! - Time only moves forward within a match
//! - Seeded RNG only
//! - No rendering, camera or detector dependencies

pub mod board;
pub mod marker;
pub mod mode;
pub mod pose;
pub mod state;

pub use board::{Board, WallPosition};
pub use marker::{Detection, Marker, Trackable};
pub use mode::{GameMode, Mode};
pub use pose::Transform;
pub use state::{GameEvent, GameState};
