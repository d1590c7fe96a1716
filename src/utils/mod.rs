pub mod args;
pub mod colors;
pub mod debug;
pub mod geometry;
pub mod helpers;
pub mod logger;

#[cfg(target_os = "linux")]
pub mod kwin;
