#[macro_use] extern crate clap;

pub mod graphics;
pub mod interface;
pub mod logging;

use gpu::headless::HeadlessDevice;
use gpu::triangle::frame_matrices;
use gpu::Diagnostics;

use interface::cli::Config;
use logging::{init_logging, LoggingConfig};

/// Frame time used to advance the animation when there is no clock to follow.
const HEADLESS_FRAME_SECONDS: f32 = 1.0 / 60.0;

/// Runs the whole setup and a few frames against the recording device.
fn run_headless(config: &Config) -> anyhow::Result<()> {
    let mut device = HeadlessDevice::new();
    let mut diagnostics = Diagnostics::new();
    let mut triangle = graphics::load_triangle(&mut device, config, &mut diagnostics)?;

    let frames = config.frame_limit().unwrap_or(0);
    for frame in 0..frames {
        let matrices = frame_matrices(frame as f32 * HEADLESS_FRAME_SECONDS, config.aspect());
        triangle.draw(&mut device, &matrices, &mut diagnostics)?;
    }

    log::info!(
        "headless: {} frame(s), {} draw call(s), {} device call(s), {} diagnostic(s)",
        frames,
        device.draws().len(),
        device.calls().len(),
        diagnostics.entries().len()
    );

    triangle.destroy(&mut device);
    Ok(())
}

fn run(config: Config) -> anyhow::Result<()> {
    if config.headless {
        run_headless(&config)
    } else {
        graphics::window::run(config)
    }
}

fn main() {
    let config = Config::from_env();

    init_logging(LoggingConfig {
        env_filter: config.log_filter.clone(),
        ..LoggingConfig::default()
    });

    if let Err(e) = run(config) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn headless_run_completes() {
        let config = Config::from_args(&["trigon", "--headless", "--frames", "2"]).unwrap();
        run_headless(&config).unwrap();
    }

    #[test]
    fn headless_run_reports_missing_shaders() {
        let config = Config::from_args(&["trigon", "--headless", "--shaders", "/nonexistent/trigon"]).unwrap();
        assert!(run_headless(&config).is_err());
    }
}
