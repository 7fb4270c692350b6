//! Match settings
//!
//! Construction-time configuration: which pattern files make up the board,
//! how wide the printed markers are, and the calibration values the rules
//! use. Read once at setup, never re-read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reaction-time tiers the config marker selects between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }
}

/// Config-marker readings up to `max_distance` millimetres from the camera
/// select `difficulty` with `reaction_time` seconds per objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyTier {
    pub difficulty: Difficulty,
    pub max_distance: f64,
    pub reaction_time: f32,
}

/// How the next target wall is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectivePolicy {
    /// Uniform among the three walls that are not the current target
    #[default]
    Random,
    /// Clockwise around the board
    Cycle,
}

/// One printed marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    /// `.patt` template file
    pub pattern: PathBuf,
    /// Printed width, millimetres
    pub width: f64,
    /// Centre offset inside a composite pattern, millimetres
    #[serde(default)]
    pub displacement: [f64; 2],
}

impl MarkerSpec {
    fn named(name: &str) -> Self {
        Self {
            pattern: PathBuf::from(format!("Resources/Markers/{name}.patt")),
            width: 120.0,
            displacement: [0.0, 0.0],
        }
    }
}

/// The six logical markers of a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// TopLeft, TopRight, BottomLeft, BottomRight
    pub walls: [MarkerSpec; 4],
    pub shield: MarkerSpec,
    pub config: MarkerSpec,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            walls: [
                MarkerSpec::named("TopLeft"),
                MarkerSpec::named("TopRight"),
                MarkerSpec::named("BottomLeft"),
                MarkerSpec::named("BottomRight"),
            ],
            shield: MarkerSpec::named("Shield"),
            config: MarkerSpec::named("Config"),
        }
    }
}

/// Game rules. Every threshold here is a calibration value for a given
/// camera and print size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub max_lives: u32,
    /// Seconds the config marker must stay put before difficulty commits
    pub config_time: f32,
    /// Millimetres the config marker may drift while being read
    pub config_stability: f64,
    /// Shield-to-target distance, millimetres, that counts as a block
    pub success_distance: f64,
    pub objective_policy: ObjectivePolicy,
    pub seed: u64,
    /// Sorted by `max_distance`
    pub difficulty: Vec<DifficultyTier>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_lives: 3,
            config_time: 3.0,
            config_stability: 25.0,
            success_distance: 80.0,
            objective_policy: ObjectivePolicy::Random,
            seed: 0x5eed,
            difficulty: vec![
                DifficultyTier {
                    difficulty: Difficulty::Hard,
                    max_distance: 400.0,
                    reaction_time: 2.0,
                },
                DifficultyTier {
                    difficulty: Difficulty::Normal,
                    max_distance: 700.0,
                    reaction_time: 3.5,
                },
                DifficultyTier {
                    difficulty: Difficulty::Easy,
                    max_distance: f64::MAX,
                    reaction_time: 5.0,
                },
            ],
        }
    }
}

impl GameRules {
    /// Tier for a config-marker reading. Readings past the last tier use it.
    pub fn tier_for(&self, distance: f64) -> Option<&DifficultyTier> {
        self.difficulty
            .iter()
            .find(|tier| distance <= tier.max_distance)
            .or_else(|| self.difficulty.last())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.max_lives == 0 {
            return invalid("max_lives must be at least 1".into());
        }
        if !self.config_time.is_finite() || self.config_time < 0.0 {
            return invalid(format!("config_time {} must be >= 0", self.config_time));
        }
        if !self.config_stability.is_finite() || self.config_stability <= 0.0 {
            return invalid(format!(
                "config_stability {} must be > 0",
                self.config_stability
            ));
        }
        if !self.success_distance.is_finite() || self.success_distance <= 0.0 {
            return invalid(format!(
                "success_distance {} must be > 0",
                self.success_distance
            ));
        }
        if self.difficulty.is_empty() {
            return invalid("difficulty table is empty".into());
        }
        if self
            .difficulty
            .windows(2)
            .any(|pair| pair[0].max_distance >= pair[1].max_distance)
        {
            return invalid("difficulty tiers must be sorted by max_distance".into());
        }
        if let Some(tier) = self
            .difficulty
            .iter()
            .find(|tier| !tier.reaction_time.is_finite() || tier.reaction_time <= 0.0)
        {
            return invalid(format!(
                "{} reaction_time {} must be > 0",
                tier.difficulty.as_str(),
                tier.reaction_time
            ));
        }
        Ok(())
    }
}

/// Everything needed to set up a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub rules: GameRules,
}

impl Settings {
    /// Parse and validate settings from JSON text
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let specs = self
            .board
            .walls
            .iter()
            .chain([&self.board.shield, &self.board.config]);
        for spec in specs {
            if !spec.width.is_finite() || spec.width <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "marker {} width {} must be > 0",
                    spec.pattern.display(),
                    spec.width
                )));
            }
        }
        self.rules.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.rules.max_lives, 3);
        assert_eq!(
            settings.board.walls[3].pattern,
            PathBuf::from("Resources/Markers/BottomRight.patt")
        );
    }

    #[test]
    fn test_tier_lookup() {
        let rules = GameRules::default();
        assert_eq!(rules.tier_for(300.0).unwrap().difficulty, Difficulty::Hard);
        assert_eq!(rules.tier_for(400.0).unwrap().difficulty, Difficulty::Hard);
        assert_eq!(rules.tier_for(650.0).unwrap().difficulty, Difficulty::Normal);
        assert_eq!(rules.tier_for(5000.0).unwrap().difficulty, Difficulty::Easy);

        let capped = GameRules {
            difficulty: vec![DifficultyTier {
                difficulty: Difficulty::Normal,
                max_distance: 500.0,
                reaction_time: 3.0,
            }],
            ..GameRules::default()
        };
        assert_eq!(capped.tier_for(900.0).unwrap().reaction_time, 3.0);
        assert!(
            GameRules {
                difficulty: Vec::new(),
                ..GameRules::default()
            }
            .tier_for(1.0)
            .is_none()
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings = Settings::from_json(r#"{ "rules": {
            "max_lives": 5, "config_time": 1.5, "config_stability": 10.0,
            "success_distance": 60.0, "objective_policy": "Cycle", "seed": 7,
            "difficulty": [
                { "difficulty": "Hard", "max_distance": 300.0, "reaction_time": 1.0 },
                { "difficulty": "Easy", "max_distance": 900.0, "reaction_time": 4.0 }
            ] } }"#)
        .unwrap();
        assert_eq!(settings.rules.max_lives, 5);
        assert_eq!(settings.rules.objective_policy, ObjectivePolicy::Cycle);
        assert_eq!(settings.board, BoardConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut rules = GameRules::default();
        rules.difficulty.swap(0, 1);
        assert!(matches!(rules.validate(), Err(ConfigError::Invalid(_))));

        let rules = GameRules {
            max_lives: 0,
            ..GameRules::default()
        };
        assert!(rules.validate().is_err());

        let mut settings = Settings::default();
        settings.board.shield.width = -1.0;
        assert!(settings.validate().is_err());

        assert!(matches!(Settings::from_json("{ nope"), Err(ConfigError::Json(_))));
    }
}
