//! Game mode state machine
//!
//! Sequences a match: find the four walls, read the difficulty off the
//! config marker, then play until the lives run out. Driven once per frame
//! with the cumulative time since the match started. The mode only reads
//! marker geometry; the board is written by the detection update alone.

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::board::{Board, WallPosition};
use super::marker::{Detection, Trackable};
use super::state::{GameEvent, GameState};
use crate::error::SetupError;
use crate::pattern::PatternRegistry;
use crate::settings::{Difficulty, GameRules, ObjectivePolicy, Settings};

/// A game variant driven by per-frame updates
pub trait Mode {
    /// Advance the rules. `elapsed_time` is seconds since match start and
    /// must not decrease between calls.
    fn update(&mut self, elapsed_time: f32);

    fn game_state(&self) -> GameState;

    fn board(&self) -> &Board;

    fn board_mut(&mut self) -> &mut Board;

    /// Detection update, marker tick, then rules, in that order
    fn frame(&mut self, detections: &[Detection], elapsed_time: f32) {
        let board = self.board_mut();
        board.update_from_detections(detections);
        board.tick(elapsed_time);
        self.update(elapsed_time);
    }
}

/// Config marker reading in progress
#[derive(Debug, Clone, Copy)]
struct ConfigReading {
    since: f32,
    anchor: DVec3,
}

/// The shield-and-walls match
#[derive(Debug)]
pub struct GameMode {
    board: Board,
    rules: GameRules,
    state: GameState,
    current_lives: u32,
    max_lives: u32,
    /// Seconds the config marker must hold still before difficulty commits
    config_time: f32,
    /// Start of the current reaction window
    time_stamp: f32,
    /// Reaction-time budget per objective
    time_to_carry_on_action: f32,
    difficulty: Option<Difficulty>,
    next_objective: WallPosition,
    score: u64,
    config_reading: Option<ConfigReading>,
    last_elapsed: Option<f32>,
    rng: Pcg32,
    events: Vec<GameEvent>,
}

impl GameMode {
    pub fn new(board: Board, rules: &GameRules, lives: u32) -> Self {
        Self {
            board,
            rules: rules.clone(),
            state: GameState::FindingWalls,
            current_lives: lives,
            max_lives: lives,
            config_time: rules.config_time,
            time_stamp: 0.0,
            time_to_carry_on_action: 0.0,
            difficulty: None,
            next_objective: WallPosition::TopLeft,
            score: 0,
            config_reading: None,
            last_elapsed: None,
            rng: Pcg32::seed_from_u64(rules.seed),
            events: Vec::new(),
        }
    }

    /// Load the board described by `settings` and start a match on it
    pub fn setup(settings: &Settings, registry: &mut PatternRegistry) -> Result<Self, SetupError> {
        let board = Board::load(registry, &settings.board)?;
        Ok(Self::new(board, &settings.rules, settings.rules.max_lives))
    }

    pub fn update(&mut self, elapsed_time: f32) {
        if self.state.is_terminal() {
            return;
        }

        let went_backwards = self.last_elapsed.is_some_and(|last| elapsed_time < last);
        if !elapsed_time.is_finite() || went_backwards {
            log::error!(
                "Elapsed time {} after {:?}: clock is not monotonic, halting",
                elapsed_time,
                self.last_elapsed
            );
            self.halt();
            return;
        }
        self.last_elapsed = Some(elapsed_time);

        match self.state {
            GameState::FindingWalls => self.find_walls(),
            GameState::SelectingDifficulty => self.select_difficulty(elapsed_time),
            GameState::Playing => self.play(elapsed_time),
            GameState::GameLost | GameState::Error => {}
        }
    }

    /// Detection update, marker tick, then rules
    pub fn frame(&mut self, detections: &[Detection], elapsed_time: f32) {
        Mode::frame(self, detections, elapsed_time);
    }

    fn find_walls(&mut self) {
        if self.board.walls_visible() {
            self.enter(GameState::SelectingDifficulty);
            self.events.push(GameEvent::WallsFound);
        } else {
            log::debug!("Finding walls: {}/4 visible", self.board.visible_walls());
        }
    }

    fn select_difficulty(&mut self, elapsed_time: f32) {
        let config = self.board.config();
        if !config.is_visible() {
            if self.config_reading.take().is_some() {
                log::debug!("Config marker lost, reading reset");
            }
            return;
        }

        let location = config.location();
        let since = match self.config_reading {
            Some(reading) if reading.anchor.distance(location) <= self.rules.config_stability => {
                reading.since
            }
            previous => {
                if previous.is_some() {
                    log::debug!("Config marker moved, reading restarted");
                }
                self.config_reading = Some(ConfigReading {
                    since: elapsed_time,
                    anchor: location,
                });
                elapsed_time
            }
        };

        let held = elapsed_time - since;
        if held < self.config_time {
            log::debug!("Config marker held {:.2}/{:.2}s", held, self.config_time);
            return;
        }

        let distance = config.distance_to_camera();
        let Some(tier) = self.rules.tier_for(distance).copied() else {
            log::error!("No difficulty tier for config reading {:.1} mm", distance);
            self.halt();
            return;
        };

        self.difficulty = Some(tier.difficulty);
        self.time_to_carry_on_action = tier.reaction_time;
        self.time_stamp = elapsed_time;
        self.config_reading = None;
        self.next_objective = self.first_objective();
        log::info!(
            "Difficulty {} ({:.0} mm): {:.2}s per objective",
            tier.difficulty.as_str(),
            distance,
            tier.reaction_time
        );
        self.enter(GameState::Playing);
        self.events.push(GameEvent::DifficultySelected {
            difficulty: tier.difficulty,
            reaction_time: tier.reaction_time,
            target: self.next_objective,
        });
    }

    fn play(&mut self, elapsed_time: f32) {
        if self.current_lives == 0 {
            self.lose();
            return;
        }

        let waited = elapsed_time - self.time_stamp;
        if waited <= self.time_to_carry_on_action && self.is_player_successful() {
            self.score += 1;
            self.next_objective = self.pick_next_objective();
            self.time_stamp = elapsed_time;
            log::info!(
                "Objective cleared in {:.2}s, score {}, next {}",
                waited,
                self.score,
                self.next_objective.as_str()
            );
            self.events.push(GameEvent::ObjectiveCleared {
                score: self.score,
                next: self.next_objective,
            });
        } else if waited > self.time_to_carry_on_action {
            self.current_lives = self.current_lives.saturating_sub(1);
            self.time_stamp = elapsed_time;
            if self.current_lives == 0 {
                self.events.push(GameEvent::LifeLost {
                    lives: 0,
                    next: self.next_objective,
                });
                self.lose();
                return;
            }
            self.next_objective = self.pick_next_objective();
            log::info!(
                "Too slow, {} lives left, next {}",
                self.current_lives,
                self.next_objective.as_str()
            );
            self.events.push(GameEvent::LifeLost {
                lives: self.current_lives,
                next: self.next_objective,
            });
        }
    }

    /// The shield is in view and within `success_distance` of the visible
    /// target wall
    pub fn is_player_successful(&self) -> bool {
        let shield = self.board.shield();
        let target = self.board.wall(self.next_objective);
        shield.is_visible()
            && target.is_visible()
            && shield.distance_to(target) <= self.rules.success_distance
    }

    fn first_objective(&mut self) -> WallPosition {
        match self.rules.objective_policy {
            ObjectivePolicy::Random => WallPosition::ALL[self.rng.random_range(0..4)],
            ObjectivePolicy::Cycle => WallPosition::TopLeft,
        }
    }

    /// Never the current objective
    fn pick_next_objective(&mut self) -> WallPosition {
        let current = self.next_objective;
        match self.rules.objective_policy {
            ObjectivePolicy::Random => {
                let offset = self.rng.random_range(1..4);
                WallPosition::ALL[(current.index() + offset) % 4]
            }
            ObjectivePolicy::Cycle => current.clockwise(),
        }
    }

    fn lose(&mut self) {
        log::info!("Game lost with score {}", self.score);
        self.enter(GameState::GameLost);
        self.events.push(GameEvent::GameLost { score: self.score });
    }

    fn halt(&mut self) {
        self.enter(GameState::Error);
        self.events.push(GameEvent::Halted);
    }

    fn enter(&mut self, next: GameState) {
        log::info!("Game state {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    /// Start a new match on the same board. The clock restarts too.
    pub fn restart(&mut self) {
        log::info!("Restarting match");
        self.state = GameState::FindingWalls;
        self.current_lives = self.max_lives;
        self.score = 0;
        self.time_stamp = 0.0;
        self.time_to_carry_on_action = 0.0;
        self.difficulty = None;
        self.config_reading = None;
        self.last_elapsed = None;
        self.events.clear();
    }

    /// Clamped to `0..=max_lives`. Ignored once the match has ended.
    pub fn set_lives(&mut self, new_lives: u32) {
        if self.state.is_terminal() {
            log::warn!("Ignoring set_lives({}) in {}", new_lives, self.state.as_str());
            return;
        }
        self.current_lives = new_lives.min(self.max_lives);
    }

    pub fn max_lives(&self) -> u32 {
        self.max_lives
    }

    pub fn lives(&self) -> u32 {
        self.current_lives
    }

    /// Index of the target wall in board order
    pub fn target_wall(&self) -> usize {
        self.next_objective.index()
    }

    pub fn target(&self) -> WallPosition {
        self.next_objective
    }

    pub fn game_state(&self) -> GameState {
        self.state
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    /// Committed difficulty, once selected
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn time_to_carry_on_action(&self) -> f32 {
        self.time_to_carry_on_action
    }

    /// Seconds left for the current objective while playing
    pub fn time_remaining(&self, elapsed_time: f32) -> Option<f32> {
        (self.state == GameState::Playing).then(|| {
            (self.time_to_carry_on_action - (elapsed_time - self.time_stamp)).max(0.0)
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take the events emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Mode for GameMode {
    fn update(&mut self, elapsed_time: f32) {
        GameMode::update(self, elapsed_time);
    }

    fn game_state(&self) -> GameState {
        self.state
    }

    fn board(&self) -> &Board {
        &self.board
    }

    fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::marker::Marker;
    use glam::DVec2;

    const SHIELD: u32 = 4;
    const CONFIG: u32 = 5;

    fn board() -> Board {
        let walls = [0, 1, 2, 3].map(|id| Marker::new(id, 120.0, DVec2::ZERO));
        Board::new(
            walls,
            Marker::new(SHIELD, 120.0, DVec2::ZERO),
            Marker::new(CONFIG, 120.0, DVec2::ZERO),
        )
    }

    fn rules(policy: ObjectivePolicy) -> GameRules {
        GameRules {
            objective_policy: policy,
            ..GameRules::default()
        }
    }

    fn wall_location(position: WallPosition) -> DVec3 {
        match position {
            WallPosition::TopLeft => DVec3::new(-200.0, 150.0, 600.0),
            WallPosition::TopRight => DVec3::new(200.0, 150.0, 600.0),
            WallPosition::BottomLeft => DVec3::new(-200.0, -150.0, 600.0),
            WallPosition::BottomRight => DVec3::new(200.0, -150.0, 600.0),
        }
    }

    fn walls() -> Vec<Detection> {
        WallPosition::ALL
            .iter()
            .map(|&p| Detection::at(p.index() as u32, wall_location(p)))
            .collect()
    }

    fn config_at(distance: f64) -> Detection {
        Detection::at(CONFIG, DVec3::new(0.0, 0.0, distance))
    }

    /// Walls in view with the shield pressed against `target`
    fn blocking(target: WallPosition) -> Vec<Detection> {
        let mut frame = walls();
        frame.push(Detection::at(SHIELD, wall_location(target) + DVec3::new(10.0, 0.0, 0.0)));
        frame
    }

    /// A match in Playing, entered at t = 3.2 with the Normal budget (3.5s)
    fn playing(policy: ObjectivePolicy) -> GameMode {
        let mut game = GameMode::new(board(), &rules(policy), 3);
        game.frame(&walls(), 0.0);
        game.frame(&[config_at(500.0)], 0.1);
        game.frame(&[config_at(500.0)], 3.2);
        assert_eq!(game.game_state(), GameState::Playing);
        game.drain_events();
        game
    }

    #[test]
    fn test_stays_finding_walls_until_all_four_seen() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        let mut frame = walls();
        frame.pop();
        for i in 0..50 {
            game.frame(&frame, i as f32 * 0.1);
            assert_eq!(game.game_state(), GameState::FindingWalls);
        }
        assert!(game.events().is_empty());
    }

    #[test]
    fn test_walls_found_transitions_once() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        game.frame(&walls(), 0.0);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);
        game.frame(&walls(), 0.1);
        game.frame(&walls(), 0.2);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);
        assert_eq!(game.drain_events(), vec![GameEvent::WallsFound]);
    }

    #[test]
    fn test_full_match_to_game_lost() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Random), 3);
        game.frame(&walls(), 0.0);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);

        game.frame(&[config_at(500.0)], 0.1);
        game.frame(&[config_at(500.0)], 0.1 + 3.0 + 0.01);
        assert_eq!(game.game_state(), GameState::Playing);
        assert_eq!(game.lives(), 3);
        assert_eq!(game.difficulty(), Some(Difficulty::Normal));
        assert_eq!(game.time_to_carry_on_action(), 3.5);

        let mut t = 3.11;
        for expected in [2, 1, 0] {
            t += 3.6;
            game.frame(&walls(), t);
            assert_eq!(game.lives(), expected);
        }
        assert_eq!(game.game_state(), GameState::GameLost);
        assert_eq!(game.score(), 0);

        // Shield on target and time passing change nothing now
        for _ in 0..5 {
            t += 4.0;
            game.frame(&blocking(game.target()), t);
        }
        assert_eq!(game.lives(), 0);
        assert_eq!(game.score(), 0);
        assert_eq!(game.game_state(), GameState::GameLost);
        assert!(matches!(
            game.events().last(),
            Some(GameEvent::GameLost { score: 0 })
        ));
    }

    #[test]
    fn test_config_flicker_resets_reading() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        game.frame(&walls(), 0.0);
        for i in 1..=20 {
            game.frame(&[config_at(500.0)], i as f32 * 0.1);
        }
        // Lost for a frame just before the threshold
        game.frame(&[], 2.5);
        game.frame(&[config_at(500.0)], 3.0);
        game.frame(&[config_at(500.0)], 3.5);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);
        game.frame(&[config_at(500.0)], 5.9);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);
        game.frame(&[config_at(500.0)], 6.0);
        assert_eq!(game.game_state(), GameState::Playing);
    }

    #[test]
    fn test_config_must_hold_still() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        game.frame(&walls(), 0.0);
        game.frame(&[config_at(500.0)], 0.5);
        // Small jitter is tolerated
        game.frame(&[config_at(510.0)], 1.5);
        // A real move restarts the reading
        game.frame(&[config_at(350.0)], 2.5);
        game.frame(&[config_at(350.0)], 3.6);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);
        game.frame(&[config_at(350.0)], 5.5);
        assert_eq!(game.game_state(), GameState::Playing);
        assert_eq!(game.difficulty(), Some(Difficulty::Hard));
        assert_eq!(game.time_to_carry_on_action(), 2.0);
    }

    #[test]
    fn test_block_scores_and_advances_target() {
        let mut game = playing(ObjectivePolicy::Cycle);
        assert_eq!(game.target(), WallPosition::TopLeft);

        game.frame(&blocking(WallPosition::TopLeft), 4.0);
        assert_eq!(game.score(), 1);
        assert_eq!(game.target(), WallPosition::TopRight);
        assert_eq!(game.lives(), 3);
        assert_eq!(
            game.drain_events(),
            vec![GameEvent::ObjectiveCleared {
                score: 1,
                next: WallPosition::TopRight
            }]
        );

        // Window restarted at 4.0, so 7.4 is still in time
        game.frame(&walls(), 7.4);
        assert_eq!(game.lives(), 3);
        game.frame(&blocking(WallPosition::TopRight), 7.45);
        assert_eq!(game.score(), 2);
        assert_eq!(game.target(), WallPosition::BottomRight);
    }

    #[test]
    fn test_block_needs_target_in_view() {
        let mut game = playing(ObjectivePolicy::Cycle);
        // Shield sits on TopLeft's stale position but TopLeft itself is hidden
        let frame: Vec<_> = blocking(WallPosition::TopLeft)
            .into_iter()
            .filter(|d| d.id != 0)
            .collect();
        game.frame(&frame, 4.0);
        assert!(!game.is_player_successful());
        assert_eq!(game.score(), 0);

        // Shield against the wrong wall
        game.frame(&blocking(WallPosition::BottomRight), 4.1);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn test_late_block_costs_a_life() {
        let mut game = playing(ObjectivePolicy::Cycle);
        game.frame(&blocking(WallPosition::TopLeft), 3.2 + 3.6);
        assert_eq!(game.score(), 0);
        assert_eq!(game.lives(), 2);
        assert_eq!(game.target(), WallPosition::TopRight);
    }

    #[test]
    fn test_random_objective_never_repeats() {
        let mut game = playing(ObjectivePolicy::Random);
        let mut t = 3.2;
        for _ in 0..200 {
            let before = game.target();
            t += 0.5;
            game.frame(&blocking(before), t);
            assert_ne!(game.target(), before);
            assert!(game.target_wall() < 4);
        }
        assert_eq!(game.score(), 200);
    }

    #[test]
    fn test_set_lives_clamps_and_zero_ends_match() {
        let mut game = playing(ObjectivePolicy::Cycle);
        game.set_lives(10);
        assert_eq!(game.lives(), 3);
        assert_eq!(game.max_lives(), 3);

        game.set_lives(0);
        game.frame(&walls(), 3.3);
        assert_eq!(game.game_state(), GameState::GameLost);

        game.set_lives(2);
        assert_eq!(game.lives(), 0);
    }

    #[test]
    fn test_clock_going_backwards_halts() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        game.frame(&[], 1.0);
        game.frame(&walls(), 0.5);
        assert_eq!(game.game_state(), GameState::Error);
        assert_eq!(game.drain_events(), vec![GameEvent::Halted]);

        game.frame(&walls(), 2.0);
        assert_eq!(game.game_state(), GameState::Error);
        assert!(game.events().is_empty());

        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        game.update(f32::NAN);
        assert_eq!(game.game_state(), GameState::Error);
    }

    #[test]
    fn test_empty_difficulty_table_halts_on_commit() {
        let rules = GameRules {
            difficulty: Vec::new(),
            ..GameRules::default()
        };
        let mut game = GameMode::new(board(), &rules, 3);
        game.frame(&walls(), 0.0);
        game.frame(&[config_at(500.0)], 0.1);
        game.frame(&[config_at(500.0)], 3.2);
        assert_eq!(game.game_state(), GameState::Error);
    }

    #[test]
    fn test_restart_after_loss() {
        let mut game = playing(ObjectivePolicy::Cycle);
        game.frame(&blocking(WallPosition::TopLeft), 4.0);
        game.set_lives(1);
        game.frame(&walls(), 8.0);
        assert_eq!(game.game_state(), GameState::GameLost);

        game.restart();
        assert_eq!(game.game_state(), GameState::FindingWalls);
        assert_eq!(game.lives(), 3);
        assert_eq!(game.score(), 0);
        assert_eq!(game.difficulty(), None);

        // New match clock starts from zero again
        game.frame(&walls(), 0.0);
        assert_eq!(game.game_state(), GameState::SelectingDifficulty);
    }

    #[test]
    fn test_time_remaining() {
        let mut game = GameMode::new(board(), &rules(ObjectivePolicy::Cycle), 3);
        assert_eq!(game.time_remaining(0.0), None);
        game.frame(&walls(), 0.0);
        game.frame(&[config_at(900.0)], 0.1);
        game.frame(&[config_at(900.0)], 3.2);
        assert_eq!(game.difficulty(), Some(Difficulty::Easy));
        let left = game.time_remaining(4.2).unwrap();
        assert!((left - 4.0).abs() < 1e-5);
        assert_eq!(game.time_remaining(20.0), Some(0.0));
    }

    #[test]
    fn test_setup_propagates_missing_patterns() {
        let mut settings = Settings::default();
        settings.board.walls[2].pattern = "no/such/dir/BottomLeft.patt".into();
        let mut registry = PatternRegistry::new();
        let result = GameMode::setup(&settings, &mut registry);
        assert!(matches!(result, Err(SetupError::Pattern { .. })));
    }
}
