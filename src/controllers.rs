//! What the bot needs from the outside world, and the real implementations.

use std::{
    thread,
    time::{Duration, Instant},
};

use enigo::{Button, Coordinate::Abs, Direction::Click, Enigo, Key, Keyboard, Mouse, Settings};
use image::{RgbImage, imageops};
use log::debug;

use crate::{
    Error, ScreenRecorder, active_window_title,
    utils::geometry::{Dimensions, Point, Region},
};

/// Screen frames, RGB channel order
pub trait PerceptionSource {
    /// Capture the full screen (`None`) or only `region`
    ///
    /// # Errors
    /// Failed capture, the caller skips the iteration
    fn capture(&mut self, region: Option<&Region>) -> Result<RgbImage, Error>;

    fn dimensions(&self) -> Dimensions;
}

/// Synthetic input
pub trait Actuator {
    /// # Errors
    /// Input couldn't be sent
    fn move_to(&mut self, point: Point) -> Result<(), Error>;

    /// Move then click
    ///
    /// # Errors
    /// Input couldn't be sent
    fn click(&mut self, point: Point, button: Button) -> Result<(), Error>;

    /// # Errors
    /// Input couldn't be sent
    fn tap(&mut self, key: Key) -> Result<(), Error>;
}

pub trait WindowGate {
    /// Whether the game window has the focus
    fn is_target_active(&mut self) -> bool;
}

/// Time source, swapped in tests to avoid waiting for real
pub trait Clock {
    fn now(&self) -> Instant;

    fn sleep(&mut self, duration: Duration);
}

/// Cut `region` out of a frame
///
/// # Errors
/// Empty region, or region not inside the frame
pub fn crop_region(frame: &RgbImage, region: &Region) -> Result<RgbImage, Error> {
    let [x1, y1, x2, y2] = region.corners();
    if region.is_empty() || x2 > frame.width() || y2 > frame.height() {
        return Err(Error::Capture(format!(
            "Region ({x1}, {y1})..({x2}, {y2}) isn't inside the {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let size = region.get_size();
    Ok(imageops::crop_imm(frame, x1, y1, size.width, size.height).to_image())
}

impl PerceptionSource for ScreenRecorder {
    fn capture(&mut self, region: Option<&Region>) -> Result<RgbImage, Error> {
        let frame = self.take_screenshot()?;
        match region {
            Some(region) => crop_region(&frame, region),
            None => Ok(frame),
        }
    }

    fn dimensions(&self) -> Dimensions {
        ScreenRecorder::dimensions(self)
    }
}

pub struct EnigoActuator {
    enigo: Enigo,
}

impl EnigoActuator {
    /// # Errors
    /// No connection to the input system
    pub fn new() -> Result<Self, Error> {
        Enigo::new(&Settings::default())
            .map(|enigo| Self { enigo })
            .map_err(|e| Error::Input(format!("Failed to initialize I/O engine: {e}")))
    }
}

impl Actuator for EnigoActuator {
    fn move_to(&mut self, point: Point) -> Result<(), Error> {
        self.enigo
            .move_mouse(point.x.cast_signed(), point.y.cast_signed(), Abs)
            .map_err(|e| Error::Input(format!("Can't move mouse to {point}: {e}")))
    }

    fn click(&mut self, point: Point, button: Button) -> Result<(), Error> {
        self.move_to(point)?;
        self.enigo
            .button(button, Click)
            .map_err(|e| Error::Input(format!("Can't click at {point}: {e}")))
    }

    fn tap(&mut self, key: Key) -> Result<(), Error> {
        self.enigo
            .key(key, Click)
            .map_err(|e| Error::Input(format!("Can't press {key:?}: {e}")))
    }
}

/// Compares the focused window title with the game one.
///
/// A single unreadable title keeps the previous answer, so one missed read
/// doesn't end a cast. Two in a row count as focus lost.
pub struct ProcessWindowGate {
    title: String,
    read_title: fn() -> Result<String, Error>,
    last: bool,
    failed_reads: u32,
}

impl ProcessWindowGate {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self::with_reader(title, active_window_title)
    }

    fn with_reader(title: &str, read_title: fn() -> Result<String, Error>) -> Self {
        Self {
            title: title.to_lowercase(),
            read_title,
            last: false,
            failed_reads: 0,
        }
    }

    fn matches(&self, focused: &str) -> bool {
        focused.to_lowercase().contains(&self.title)
    }
}

impl WindowGate for ProcessWindowGate {
    fn is_target_active(&mut self) -> bool {
        match (self.read_title)() {
            Ok(focused) => {
                self.failed_reads = 0;
                self.last = self.matches(&focused);
            }
            Err(e) => {
                self.failed_reads += 1;
                debug!("Can't read the focused window ({}): {e}", self.failed_reads);
                if self.failed_reads > 1 {
                    self.last = false;
                }
            }
        }

        self.last
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}
