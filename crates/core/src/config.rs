//! Engine configuration.
//!
//! Defaults, then command-line flags, then the `ENGINE_DEBUG` environment
//! variable, each overriding the previous.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variable that forces debug mode on (`1`) or off (`0`).
pub const DEBUG_ENV_VAR: &str = "ENGINE_DEBUG";

/// Startup configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Initial window title.
    pub title: String,
    /// Enables validation layers and debug-level logging.
    pub debug: bool,
    /// Directory holding the compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
    /// Clear color for the color attachment.
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            title: "Engine".to_string(),
            debug: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders/spirv"),
            clear_color: [1.0, 0.5, 0.25, 1.0],
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from command-line arguments (without the
    /// program name). Only `--debug` and `--no-debug` are recognised.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            match arg.as_ref() {
                "--debug" => config.debug = true,
                "--no-debug" => config.debug = false,
                other => {
                    return Err(Error::Config(format!("Unknown argument '{}'", other)));
                }
            }
        }
        Ok(config)
    }

    /// Applies an `ENGINE_DEBUG` value, if present.
    pub fn apply_env(&mut self, debug_var: Option<&str>) -> Result<()> {
        match debug_var.map(str::trim) {
            None => Ok(()),
            Some("1") | Some("true") => {
                self.debug = true;
                Ok(())
            }
            Some("0") | Some("false") => {
                self.debug = false;
                Ok(())
            }
            Some(other) => Err(Error::Config(format!(
                "{} must be 1 or 0, got '{}'",
                DEBUG_ENV_VAR, other
            ))),
        }
    }

    /// Reads the process arguments and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_args(std::env::args().skip(1))?;
        let debug_var = std::env::var(DEBUG_ENV_VAR).ok();
        config.apply_env(debug_var.as_deref())?;
        Ok(config)
    }

    /// Path of a compiled shader inside [`EngineConfig::shader_dir`].
    pub fn shader_path(&self, file_name: &str) -> PathBuf {
        self.shader_dir.join(file_name)
    }
}
