use clap::{App, ArgMatches, Error, ErrorKind};

use std::ffi::OsString;
use std::path::PathBuf;

/// Frames drawn by `--headless` when `--frames` isn't given.
pub const DEFAULT_HEADLESS_FRAMES: u64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `None` means the shaders built into the binary.
    pub shaders: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub headless: bool,
    pub frames: Option<u64>,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shaders: None,
            width: 1280,
            height: 720,
            vsync: true,
            headless: false,
            frames: None,
            log_filter: None,
        }
    }
}

impl Config {
    /// Parses the process arguments, printing help or an error and exiting if they don't parse.
    pub fn from_env() -> Self {
        Self::from_args(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let yaml = load_yaml!("cli.yaml");
        let matches = App::from_yaml(yaml).get_matches_from_safe(args)?;

        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, Error> {
        let width = value_t!(matches, "width", u32)?;
        let height = value_t!(matches, "height", u32)?;
        if width == 0 || height == 0 {
            return Err(Error::with_description(
                "window dimensions must be non-zero",
                ErrorKind::InvalidValue,
            ));
        }

        let frames = match matches.value_of("frames") {
            Some(_) => Some(value_t!(matches, "frames", u64)?),
            None => None,
        };

        Ok(Self {
            shaders: matches.value_of_os("shaders").map(PathBuf::from),
            width,
            height,
            vsync: !matches.is_present("no-vsync"),
            headless: matches.is_present("headless"),
            frames,
            log_filter: matches.value_of("log").map(str::to_string),
        })
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// How many frames to draw before stopping, if there's a limit at all.
    pub fn frame_limit(&self) -> Option<u64> {
        match (self.frames, self.headless) {
            (Some(n), _) => Some(n),
            (None, true) => Some(DEFAULT_HEADLESS_FRAMES),
            (None, false) => None,
        }
    }
}
