use std::{path::PathBuf, time::Duration};

use clap::Parser;
use enigo::Key;

use crate::bot::Config;

#[derive(Parser, Debug)]
#[command(name = "splashy", version)]
#[command(about = "Fishing bot watching the screen for bobbers and splashes")]
pub struct Args {
    /// Key bound to the fishing skill: a character, F1-F12, `home`, `end` or `space`
    #[arg(long, value_parser = key_parser)]
    pub key: Key,

    /// Splash probability, time bias included, above which the bobber is clicked
    #[arg(long, default_value_t = 0.5, value_parser = threshold_parser)]
    pub splash_threshold: f64,

    /// Bobber mask value above which a pixel counts as bobber
    #[arg(long, default_value_t = 0.2, value_parser = threshold_parser)]
    pub bobber_threshold: f64,

    /// Seconds before an untouched bobber is given up
    #[arg(long, default_value = "20", value_parser = seconds_parser)]
    pub max_lifetime: Duration,

    /// Seconds for the bobber to show up after casting
    #[arg(long, default_value = "2", value_parser = seconds_parser)]
    pub show_up: Duration,

    /// Seconds to wait before each cast
    #[arg(long, default_value = "4.5", value_parser = seconds_parser)]
    pub cast_wait: Duration,

    /// Seconds for the loot window to open
    #[arg(long, default_value = "0.5", value_parser = seconds_parser)]
    pub loot_settle: Duration,

    /// Seconds before each loot click
    #[arg(long, default_value = "0.5", value_parser = seconds_parser)]
    pub loot_gap: Duration,

    /// Clicks on the loot, one per item
    #[arg(long, default_value_t = 1)]
    pub loot_clicks: u32,

    /// Horizontal shift from the loot icon center to the item
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub loot_offset_x: i32,

    /// Vertical shift from the loot icon center to the item
    #[arg(long, default_value_t = 75, allow_negative_numbers = true)]
    pub loot_offset_y: i32,

    /// Ignore loot icon matches whose mean squared error is above this
    #[arg(long)]
    pub loot_max_error: Option<f64>,

    /// Seconds between focus checks while the game is in the background
    #[arg(long, default_value = "5", value_parser = seconds_parser)]
    pub inactive_sleep: Duration,

    /// Seconds allowed for the game to be focused at startup
    #[arg(long, default_value = "600", value_parser = seconds_parser)]
    pub startup_wait: Duration,

    /// Half side, in pixels, of the area watched around the bobber
    #[arg(long, default_value_t = 64)]
    pub crop_half_size: u32,

    /// Title of the game window
    #[arg(long, default_value = "World of Warcraft")]
    pub window: String,

    /// Picture of the loot icon
    #[arg(long)]
    pub template: PathBuf,

    /// JSON parameters of the bobber model
    #[arg(long)]
    pub bobber_checkpoint: Option<PathBuf>,

    /// JSON parameters of the splash model
    #[arg(long)]
    pub splash_checkpoint: Option<PathBuf>,

    /// Don't favor the usual bobber area
    #[arg(long)]
    pub no_prior: bool,

    /// Save model inputs and outputs under `logs/`
    #[arg(long)]
    pub save_data: bool,

    /// File every log line is appended to
    #[arg(long, default_value = "logs/splashy.txt")]
    pub log_file: PathBuf,

    /// Only log to the terminal
    #[arg(long)]
    pub no_log_file: bool,

    /// Only log errors
    #[arg(long, short)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn config(&self) -> Config {
        #[allow(clippy::cast_possible_truncation)]
        let bobber_threshold = self.bobber_threshold as f32;

        Config {
            key: self.key,
            splash_threshold: self.splash_threshold,
            bobber_threshold,
            max_lifetime: self.max_lifetime,
            show_up: self.show_up,
            cast_wait: self.cast_wait,
            loot_settle: self.loot_settle,
            loot_gap: self.loot_gap,
            loot_clicks: self.loot_clicks,
            inactive_sleep: self.inactive_sleep,
            startup_wait: self.startup_wait,
            crop_half_size: self.crop_half_size,
            snapshots: self.save_data.then(|| PathBuf::from("logs")),
        }
    }
}

/// Parse a threshold
///
/// # Errors
/// If user provided wrong value
pub fn threshold_parser(s: &str) -> Result<f64, String> {
    let val: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a valid number"))?;

    if (0.0..=1.0).contains(&val) {
        Ok(val)
    } else {
        Err(format!("Value must be between 0 and 1, got {val}"))
    }
}

/// Parse a duration in seconds, fractions allowed
///
/// # Errors
/// If user provided wrong value
pub fn seconds_parser(s: &str) -> Result<Duration, String> {
    let val: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a valid number"))?;

    Duration::try_from_secs_f64(val).map_err(|_| format!("`{s}` isn't a valid duration"))
}

/// Parse the fishing key
///
/// # Errors
/// If user provided an unknown key
pub fn key_parser(s: &str) -> Result<Key, String> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(Key::Unicode(c.to_ascii_lowercase()));
    }

    let function_keys = [
        Key::F1,
        Key::F2,
        Key::F3,
        Key::F4,
        Key::F5,
        Key::F6,
        Key::F7,
        Key::F8,
        Key::F9,
        Key::F10,
        Key::F11,
        Key::F12,
    ];

    match s.to_lowercase().as_str() {
        "home" => Ok(Key::Home),
        "end" => Ok(Key::End),
        "space" => Ok(Key::Space),
        f => f
            .strip_prefix('f')
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| function_keys.get(i).copied())
            .ok_or_else(|| format!("Unknown key `{s}`")),
    }
}
