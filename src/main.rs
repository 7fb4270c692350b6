//! AR Shield entry point
//!
//! Headless host: owns the frame loop and feeds detection frames to the game
//! mode. Frames come from a recorded replay, or from a scripted player when
//! no replay is given.
//!
//! Usage: `ar-shield [settings.json] [replay.json]`

#[cfg(not(target_arch = "wasm32"))]
mod host {
    use std::path::Path;
    use std::process::ExitCode;

    use glam::{DVec2, DVec3};
    use serde::Deserialize;

    use ar_shield::pattern::PatternRegistry;
    use ar_shield::settings::Settings;
    use ar_shield::sim::{Board, Detection, GameEvent, GameMode, GameState, Marker, WallPosition};

    /// Frame rate of the scripted session
    const SCRIPT_FPS: f32 = 30.0;
    /// Scripted sessions stop here even if the match is still running
    const SCRIPT_LIMIT_SECS: f32 = 300.0;
    /// Objectives the scripted player clears before it stops trying
    const SCRIPT_BLOCKS: u64 = 3;

    /// One recorded frame
    #[derive(Debug, Deserialize)]
    struct ReplayFrame {
        elapsed: f32,
        #[serde(default)]
        detections: Vec<Detection>,
    }

    pub fn run() -> ExitCode {
        env_logger::init();
        log::info!("AR Shield starting...");

        let args: Vec<String> = std::env::args().skip(1).collect();
        let settings = match args.first() {
            Some(path) => match Settings::load(Path::new(path)) {
                Ok(settings) => settings,
                Err(e) => {
                    log::error!("Settings: {}", e);
                    return ExitCode::FAILURE;
                }
            },
            None => {
                log::info!("Using default settings");
                Settings::default()
            }
        };

        let game = match args.get(1) {
            Some(path) => replay(&settings, Path::new(path)),
            None => scripted(&settings),
        };

        match game {
            Ok(game) => report(&game),
            Err(e) => {
                log::error!("{}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn replay(settings: &Settings, path: &Path) -> Result<GameMode, Box<dyn std::error::Error>> {
        let mut registry = PatternRegistry::new();
        let mut game = GameMode::setup(settings, &mut registry)?;
        let json = std::fs::read_to_string(path)?;
        let frames: Vec<ReplayFrame> = serde_json::from_str(&json)?;
        log::info!("Replaying {} frames from {}", frames.len(), path.display());

        for frame in &frames {
            game.frame(&frame.detections, frame.elapsed);
            log_events(&mut game, frame.elapsed);
            if game.game_state().is_terminal() {
                break;
            }
        }
        Ok(game)
    }

    /// Board laid out in front of the camera, 600 mm away
    fn wall_location(position: WallPosition) -> DVec3 {
        match position {
            WallPosition::TopLeft => DVec3::new(-250.0, 180.0, 600.0),
            WallPosition::TopRight => DVec3::new(250.0, 180.0, 600.0),
            WallPosition::BottomLeft => DVec3::new(-250.0, -180.0, 600.0),
            WallPosition::BottomRight => DVec3::new(250.0, -180.0, 600.0),
        }
    }

    /// Plays a match against synthetic detections: shows three walls, then
    /// all four, holds the config marker still, blocks a few objectives and
    /// then lets every objective time out.
    fn scripted(settings: &Settings) -> Result<GameMode, Box<dyn std::error::Error>> {
        settings.validate()?;
        let spec = &settings.board;
        let walls = [0, 1, 2, 3].map(|id| Marker::new(id, spec.walls[id as usize].width, DVec2::ZERO));
        let board = Board::new(
            walls,
            Marker::new(4, spec.shield.width, DVec2::ZERO),
            Marker::new(5, spec.config.width, DVec2::ZERO),
        );
        let shield_id = board.shield().id();
        let config_id = board.config().id();
        let mut game = GameMode::new(board, &settings.rules, settings.rules.max_lives);
        log::info!("Running scripted session");

        let mut frame_index = 0u32;
        loop {
            let elapsed = frame_index as f32 / SCRIPT_FPS;
            if elapsed > SCRIPT_LIMIT_SECS || game.game_state().is_terminal() {
                break;
            }

            let mut detections: Vec<Detection> = WallPosition::ALL
                .iter()
                .filter(|&&p| elapsed >= 0.5 || p != WallPosition::BottomRight)
                .map(|&p| Detection::at(p.index() as u32, wall_location(p)))
                .collect();

            match game.game_state() {
                GameState::SelectingDifficulty => {
                    detections.push(Detection::at(config_id, DVec3::new(0.0, 0.0, 550.0)));
                }
                GameState::Playing if game.score() < SCRIPT_BLOCKS => {
                    // Reach the target halfway through the reaction window
                    let remaining = game.time_remaining(elapsed).unwrap_or(0.0);
                    if remaining <= game.time_to_carry_on_action() / 2.0 {
                        let target = wall_location(game.target());
                        detections.push(Detection::at(shield_id, target + DVec3::new(0.0, 0.0, -20.0)));
                    }
                }
                _ => {}
            }

            game.frame(&detections, elapsed);
            log_events(&mut game, elapsed);
            frame_index += 1;
        }
        Ok(game)
    }

    fn log_events(game: &mut GameMode, elapsed: f32) {
        for event in game.drain_events() {
            match event {
                GameEvent::WallsFound => log::info!("[{:7.2}] walls found", elapsed),
                GameEvent::DifficultySelected {
                    difficulty,
                    reaction_time,
                    target,
                } => log::info!(
                    "[{:7.2}] {} selected ({:.1}s), first target {}",
                    elapsed,
                    difficulty.as_str(),
                    reaction_time,
                    target.as_str()
                ),
                GameEvent::ObjectiveCleared { score, next } => {
                    log::info!("[{:7.2}] blocked! score {}, next {}", elapsed, score, next.as_str())
                }
                GameEvent::LifeLost { lives, next } => {
                    log::info!("[{:7.2}] missed, {} lives, next {}", elapsed, lives, next.as_str())
                }
                GameEvent::GameLost { score } => {
                    log::info!("[{:7.2}] game over, score {}", elapsed, score)
                }
                GameEvent::Halted => log::error!("[{:7.2}] game halted", elapsed),
            }
        }
    }

    fn report(game: &GameMode) -> ExitCode {
        println!(
            "state: {}  score: {}  lives: {}/{}",
            game.game_state().as_str(),
            game.score(),
            game.lives(),
            game.max_lives()
        );
        if game.game_state() == GameState::Error {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    host::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // No camera host on wasm32; the library is driven by the embedding page
}
