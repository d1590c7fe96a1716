//! Turning model outputs and screenshots into decisions and coordinates.

pub mod bobber;
pub mod loot;
pub mod mask;
pub mod splash;

pub use bobber::locate as locate_bobber;
pub use loot::LootLocalizer;
pub use mask::{PriorMask, ProbabilityMask};
pub use splash::{SplashDecision, evaluate as evaluate_splash};
