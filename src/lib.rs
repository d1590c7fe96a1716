use std::{
    sync::{Arc, Mutex},
    thread::spawn,
    time::Duration,
};

use image::RgbImage;
use log::warn;
use scap::{
    capturer::{Capturer, Options, Resolution},
    frame::Frame,
};
use sysinfo::{ProcessRefreshKind, RefreshKind, System};

#[cfg(target_os = "linux")]
use crate::utils::kwin::{active_window_caption_kde, search_windows_kde, window_activate_kde};
use crate::utils::geometry::Dimensions;

pub mod bot;
pub mod controllers;
pub mod models;
pub mod perception;
mod utils;

pub use crate::utils::{args, colors, debug, geometry, helpers, logger};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Screen capture error: {0}")]
    Capture(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Loot template error: {0}")]
    Template(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("Target window wasn't focused within {0:?}, please restart")]
    StartupTimeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] serde_json::Error),
}

/// Game process, run through Wine on Linux
pub const GAME_EXECUTABLE: &str = "Wow.exe";

/// Check if a process is running
#[must_use]
pub fn check_running(name: &str) -> bool {
    let sys = System::new_with_specifics(
        RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
    );

    sys.processes()
        .values()
        .any(|process| process.name().eq_ignore_ascii_case(name))
}

/// Raise a window
///
/// # Errors
/// Erroring if can't raise the asked program
#[cfg(target_os = "linux")]
pub fn raise(title: &str) -> Result<(), Error> {
    // KDE specific
    if is_kde() {
        search_windows_kde(title)
            .and_then(|s| window_activate_kde(&s))
            .map_err(|err| Error::Window(format!("Something went wrong: {err}")))
    } else {
        Err(Error::Window("Only KDE Plasma is supported on Linux".into()))
    }
}

#[cfg(target_os = "windows")]
pub fn raise(_title: &str) -> Result<(), Error> {
    Err(Error::Window("Raising windows isn't supported on Windows".into()))
}

/// Title of the focused window
///
/// # Errors
/// If the desktop can't be queried
#[cfg(target_os = "linux")]
pub fn active_window_title() -> Result<String, Error> {
    if is_kde() {
        active_window_caption_kde().map_err(|err| Error::Window(err.to_string()))
    } else {
        Err(Error::Window("Only KDE Plasma is supported on Linux".into()))
    }
}

/// Title of the focused window
///
/// # Errors
/// If no window has the focus
#[cfg(target_os = "windows")]
pub fn active_window_title() -> Result<String, Error> {
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW};

    let mut title = [0u16; 512];
    // SAFETY: the buffer outlives the call and its length is passed along
    let len = unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.is_invalid() {
            return Err(Error::Window("No focused window".into()));
        }
        GetWindowTextW(hwnd, &mut title)
    };

    let len = usize::try_from(len).unwrap_or_default();
    Ok(String::from_utf16_lossy(&title[..len]))
}

#[cfg(target_os = "linux")]
fn is_kde() -> bool {
    std::env::var("DESKTOP_SESSION")
        .map(|v| v.eq("plasma"))
        .unwrap_or(false)
}

pub struct ScreenRecorder {
    old_frame: Arc<Mutex<Frame>>,

    pub width: u32,
    pub height: u32,
}

impl ScreenRecorder {
    /// Initialize screen recording
    ///
    /// # Errors
    /// Can't capture screen
    pub fn new() -> Result<Self, Error> {
        if !scap::is_supported() {
            return Err(Error::Capture("Platform not supported".into()));
        }

        // If we don't have the permission, request it
        if !scap::has_permission() {
            warn!("Permission not granted. Requesting permission...");
            if !scap::request_permission() {
                return Err(Error::Capture("Permission denied".into()));
            }
        }

        // Create capturer on primary display
        let mut capturer = Capturer::build(Options {
            fps: 10,
            target: None,
            show_cursor: false,
            show_highlight: false,
            output_resolution: Resolution::Captured,
            ..Default::default()
        })
        .map_err(|e| Error::Capture(format!("Can't capture the screen: {e}")))?;

        capturer.start_capture();

        let first_frame = capturer
            .get_next_frame()
            .map_err(|e| Error::Capture(format!("Can't receive frames: {e}")))?;

        // Sizes reported by the backend aren't reliable on Linux, read them from a frame
        let [width, height] = frame_size(&first_frame).map(i32::cast_unsigned);
        let old_frame = Arc::new(Mutex::new(first_frame));

        // Consume every frame, keeping the latest, so they don't pile up
        let frame_clone = Arc::clone(&old_frame);
        spawn(move || {
            while let Ok(frame) = capturer.get_next_frame() {
                if let Ok(mut guard) = frame_clone.try_lock() {
                    *guard = frame;
                }
            }
        });

        Ok(Self {
            old_frame,
            width,
            height,
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    fn take_frame(&self) -> Result<Frame, Error> {
        self.old_frame
            .lock()
            .map(|f| f.clone())
            .map_err(|e| Error::Capture(format!("Can't read stored frame: {e}")))
    }

    /// Take a screenshot, channels in RGB order
    ///
    /// # Errors
    /// Received unprocessable frame
    pub fn take_screenshot(&self) -> Result<RgbImage, Error> {
        frame_to_rgb(self.take_frame()?)
    }
}

fn frame_to_rgb(frame: Frame) -> Result<RgbImage, Error> {
    let [width, height] = frame_size(&frame).map(i32::cast_unsigned);
    let data = match frame {
        Frame::RGB(f) => f.data,
        Frame::RGBx(f) => f.data.chunks(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        Frame::XBGR(f) => f.data.chunks(4).flat_map(|p| [p[3], p[2], p[1]]).collect(),
        Frame::BGRx(f) => swap_bgr(&f.data),
        Frame::BGR0(f) => swap_bgr(&f.data),
        Frame::BGRA(f) => swap_bgr(&f.data),
        Frame::YUVFrame(_) => {
            return Err(Error::Capture("YUV frames aren't supported".into()));
        }
    };

    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| Error::Capture("Can't convert image from raw data".into()))
}

fn frame_size(frame: &Frame) -> [i32; 2] {
    match frame {
        Frame::YUVFrame(f) => [f.width, f.height],
        Frame::RGB(f) => [f.width, f.height],
        Frame::RGBx(f) => [f.width, f.height],
        Frame::XBGR(f) => [f.width, f.height],
        Frame::BGRx(f) => [f.width, f.height],
        Frame::BGR0(f) => [f.width, f.height],
        Frame::BGRA(f) => [f.width, f.height],
    }
}

/// 4-bytes BGR-first pixels to packed RGB
fn swap_bgr(data: &[u8]) -> Vec<u8> {
    data.chunks(4)
        .flat_map(|pixel| [pixel[2], pixel[1], pixel[0]])
        .collect()
}
