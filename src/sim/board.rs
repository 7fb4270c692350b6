//! The marker board: four wall corners, the shield and the config marker
//!
//! The board is the single owner of every marker. The state machine reads it
//! through shared borrows; only the per-frame detection update writes it.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use super::marker::{Detection, Marker, Trackable};
use crate::error::SetupError;
use crate::pattern::PatternRegistry;
use crate::settings::BoardConfig;

/// Wall corners of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WallPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl WallPosition {
    /// Board order, matching `index()`
    pub const ALL: [WallPosition; 4] = [
        WallPosition::TopLeft,
        WallPosition::TopRight,
        WallPosition::BottomLeft,
        WallPosition::BottomRight,
    ];

    pub fn index(self) -> usize {
        match self {
            WallPosition::TopLeft => 0,
            WallPosition::TopRight => 1,
            WallPosition::BottomLeft => 2,
            WallPosition::BottomRight => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Next corner going clockwise around the board
    pub fn clockwise(self) -> Self {
        match self {
            WallPosition::TopLeft => WallPosition::TopRight,
            WallPosition::TopRight => WallPosition::BottomRight,
            WallPosition::BottomRight => WallPosition::BottomLeft,
            WallPosition::BottomLeft => WallPosition::TopLeft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WallPosition::TopLeft => "TopLeft",
            WallPosition::TopRight => "TopRight",
            WallPosition::BottomLeft => "BottomLeft",
            WallPosition::BottomRight => "BottomRight",
        }
    }
}

/// All markers used by one match
#[derive(Debug, Clone)]
pub struct Board {
    walls: [Marker; 4],
    shield: Marker,
    config: Marker,
}

impl Board {
    /// `walls` in [`WallPosition::ALL`] order
    pub fn new(walls: [Marker; 4], shield: Marker, config: Marker) -> Self {
        Self {
            walls,
            shield,
            config,
        }
    }

    /// Load all six patterns: the four walls in board order, then shield,
    /// then config. The first failure aborts setup.
    pub fn load(registry: &mut PatternRegistry, config: &BoardConfig) -> Result<Self, SetupError> {
        let [tl, tr, bl, br] = &config.walls;
        let walls = [
            Marker::load(registry, tl)?,
            Marker::load(registry, tr)?,
            Marker::load(registry, bl)?,
            Marker::load(registry, br)?,
        ];
        let shield = Marker::load(registry, &config.shield)?;
        let config = Marker::load(registry, &config.config)?;
        log::info!(
            "Board ready: walls {:?}, shield {}, config {}",
            walls.iter().map(Marker::id).collect::<Vec<_>>(),
            shield.id(),
            config.id()
        );
        Ok(Self::new(walls, shield, config))
    }

    /// Apply one frame's candidates to every marker
    pub fn update_from_detections(&mut self, detections: &[Detection]) {
        for marker in self.markers_mut() {
            marker.update_from_detections(detections);
        }
    }

    pub fn tick(&mut self, elapsed_time: f32) {
        for marker in self.markers_mut() {
            marker.tick(elapsed_time);
        }
    }

    pub fn wall(&self, position: WallPosition) -> &Marker {
        &self.walls[position.index()]
    }

    pub fn walls(&self) -> &[Marker; 4] {
        &self.walls
    }

    pub fn shield(&self) -> &Marker {
        &self.shield
    }

    pub fn config(&self) -> &Marker {
        &self.config
    }

    /// Every wall corner was seen this frame
    pub fn walls_visible(&self) -> bool {
        self.walls.iter().all(Marker::is_visible)
    }

    pub fn visible_walls(&self) -> usize {
        self.walls.iter().filter(|w| w.is_visible()).count()
    }

    fn markers_mut(&mut self) -> impl Iterator<Item = &mut Marker> {
        self.walls
            .iter_mut()
            .chain([&mut self.shield, &mut self.config])
    }
}

impl Index<WallPosition> for Board {
    type Output = Marker;

    fn index(&self, position: WallPosition) -> &Marker {
        self.wall(position)
    }
}
