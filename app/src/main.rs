use std::process::ExitCode;

use clap::Parser;
use graphite_app::AppArgs;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    graphite_core::init();
    graphite_graphics::init();
    graphite_app::init();

    let args = AppArgs::parse();

    match graphite_app::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Graphite failed: {e}");
            ExitCode::FAILURE
        }
    }
}
