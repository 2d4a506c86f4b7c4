pub mod debug;
pub mod opengl;
pub mod utils;
pub mod window;

use anyhow::Context;

use gpu::triangle::{embedded_sources, HelloTriangle, ShaderPaths};
use gpu::{Device, Diagnostics, FileSystemStore};

use crate::interface::cli::Config;

/// Builds the triangle from `--shaders` if given, otherwise from the shaders built into the binary.
pub fn load_triangle<D: Device + ?Sized>(
    device: &mut D,
    config: &Config,
    diagnostics: &mut Diagnostics,
) -> anyhow::Result<HelloTriangle> {
    let paths = ShaderPaths::default();

    match &config.shaders {
        Some(dir) => {
            let store = FileSystemStore::new(dir);
            HelloTriangle::new(device, &store, &paths, diagnostics)
                .with_context(|| format!("setting up the triangle from {}", dir.display()))
        }
        None => HelloTriangle::new(device, &embedded_sources(), &paths, diagnostics)
            .context("setting up the triangle from the built-in shaders"),
    }
}
