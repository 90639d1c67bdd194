// Shared helpers for the integration scenarios.

use env_logger::{Builder, Env};
use tilecraft_sim::config::{GameConfig, LevelConfig};
use tilecraft_sim::controller::GameController;
use tilecraft_sim::presentation::HeadlessPresenter;

/// Installs a test logger once. Later calls are ignored.
pub fn init_logging() {
    let env = Env::default().default_filter_or("warn");
    // `try_init` only fails if a logger was already set.
    let _ = Builder::from_env(env).is_test(true).try_init();
}

/// Builds a controller from level JSON with default tuning.
pub fn controller(json: &str) -> GameController {
    init_logging();
    let config = LevelConfig::from_json(json).expect("level json parses");
    GameController::new(config, GameConfig::default()).expect("level validates")
}

pub fn presenter() -> HeadlessPresenter {
    HeadlessPresenter::from_config(&GameConfig::default())
}
