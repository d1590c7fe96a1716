//! The fishing loop: cast, find the bobber, watch for the splash, loot.

use std::{
    fmt,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use enigo::{Button, Key};
use image::RgbImage;
use log::{debug, info, warn};

use crate::{
    Error,
    controllers::{Actuator, Clock, PerceptionSource, WindowGate},
    models::{BobberModel, SplashModel},
    perception::{
        LootLocalizer, PriorMask, SplashDecision, evaluate_splash, locate_bobber,
        mask::ProbabilityMask,
    },
    utils::{
        debug::Drawable,
        geometry::{Dimensions, Point, Region},
        helpers::unix_millis,
    },
};

/// Where the pointer waits so it doesn't hide the bobber
const REST_POINT: Point = Point { x: 0, y: 0 };

/// Focus polling rate until the game is first focused
const STARTUP_POLL: Duration = Duration::from_millis(100);

/// Gap between camera key taps during preparation
const PREPARATION_GAP: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct Config {
    /// Key bound to the fishing skill
    pub key: Key,
    pub splash_threshold: f64,
    pub bobber_threshold: f32,
    /// Bobber lifetime before casting again
    pub max_lifetime: Duration,
    /// Wait for the bobber to show up after the cast
    pub show_up: Duration,
    /// Wait before each cast
    pub cast_wait: Duration,
    /// Wait for the loot window after reeling in
    pub loot_settle: Duration,
    /// Wait before each loot click
    pub loot_gap: Duration,
    pub loot_clicks: u32,
    /// Sleep between focus checks once started
    pub inactive_sleep: Duration,
    /// Budget for the game window to be focused the first time
    pub startup_wait: Duration,
    /// Half side of the square captured around the bobber
    pub crop_half_size: u32,
    /// Directory for annotated snapshots
    pub snapshots: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key: Key::Unicode('1'),
            splash_threshold: 0.5,
            bobber_threshold: 0.2,
            max_lifetime: Duration::from_secs(20),
            show_up: Duration::from_secs(2),
            cast_wait: Duration::from_millis(4500),
            loot_settle: Duration::from_millis(500),
            loot_gap: Duration::from_millis(500),
            loot_clicks: 1,
            inactive_sleep: Duration::from_secs(5),
            startup_wait: Duration::from_secs(600),
            crop_half_size: 64,
            snapshots: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    AwaitingFocus,
    Casting,
    DetectingBobber,
    WatchingSplash,
    Looting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::AwaitingFocus => "awaiting focus",
            Phase::Casting => "casting",
            Phase::DetectingBobber => "detecting the bobber",
            Phase::WatchingSplash => "watching for a splash",
            Phase::Looting => "looting",
        })
    }
}

/// State of the current attempt, passed from one step to the next
#[derive(Clone, Debug, Default)]
pub struct FishingSession {
    pub phase: Phase,
    /// Set by the cast, only a new cast resets it
    pub cast_start_time: Option<Instant>,
    pub last_known_bobber_position: Option<Point>,
    /// Frame captured after the cast, for bobber detection
    pub frame: Option<RgbImage>,
}

impl FishingSession {
    /// Fresh session, ready to cast
    #[must_use]
    pub fn casting() -> Self {
        Self {
            phase: Phase::Casting,
            ..Default::default()
        }
    }

    fn with_phase(self, phase: Phase) -> Self {
        Self { phase, ..self }
    }
}

/// Outside world the bot acts upon
pub struct Collaborators {
    pub source: Box<dyn PerceptionSource>,
    pub actuator: Box<dyn Actuator>,
    pub gate: Box<dyn WindowGate>,
    pub clock: Box<dyn Clock>,
}

/// Everything used to understand frames
pub struct Perception {
    pub bobber_model: Box<BobberModel>,
    pub splash_model: Box<SplashModel>,
    pub loot: LootLocalizer,
    /// Screen sized prior, `None` to trust the model alone
    pub prior: Option<PriorMask>,
}

pub struct FishingBot {
    config: Config,
    io: Collaborators,
    perception: Perception,
    /// Prior at the last mask resolution seen
    resized_prior: Option<PriorMask>,
    started_at: Instant,
    /// Camera set up, happens once the game is first focused
    prepared: bool,
}

/// Input is fire-and-forget, failures are only reported
fn fire(result: Result<(), Error>) {
    if let Err(e) = result {
        warn!("{e}");
    }
}

impl FishingBot {
    #[must_use]
    pub fn new(config: Config, io: Collaborators, perception: Perception) -> Self {
        let started_at = io.clock.now();

        Self {
            config,
            io,
            perception,
            resized_prior: None,
            started_at,
            prepared: false,
        }
    }

    /// Run forever
    ///
    /// # Errors
    /// Game window not focused in time
    pub fn run(&mut self) -> Result<(), Error> {
        info!(
            "Waiting up to {:?} for the game window to be focused...",
            self.config.startup_wait
        );

        let mut session = FishingSession::default();
        loop {
            session = self.step(session)?;
        }
    }

    /// One iteration of the loop, focus is checked first whatever the phase
    ///
    /// # Errors
    /// Game window not focused within the startup budget
    pub fn step(&mut self, session: FishingSession) -> Result<FishingSession, Error> {
        if !self.io.gate.is_target_active() {
            return self.focus_lost(session.phase);
        }

        Ok(match session.phase {
            Phase::AwaitingFocus => {
                if self.prepared {
                    info!("Game window is active again");
                } else {
                    self.prepare();
                }
                FishingSession::casting()
            }
            Phase::Casting => self.cast(),
            Phase::DetectingBobber => self.detect_bobber(session),
            Phase::WatchingSplash => self.watch_splash(session),
            Phase::Looting => self.loot(session),
        })
    }

    fn focus_lost(&mut self, phase: Phase) -> Result<FishingSession, Error> {
        if self.prepared {
            if phase != Phase::AwaitingFocus {
                info!("Game window lost focus while {phase}, stopping fishing");
            }
            info!(
                "Game window isn't active, sleeping for {:?}...",
                self.config.inactive_sleep
            );
            self.io.clock.sleep(self.config.inactive_sleep);
        } else {
            let waited = self
                .io
                .clock
                .now()
                .saturating_duration_since(self.started_at);
            if waited > self.config.startup_wait {
                return Err(Error::StartupTimeout(self.config.startup_wait));
            }
            debug!("Still waiting for the game window ({waited:?})");
            self.io.clock.sleep(STARTUP_POLL);
        }

        Ok(FishingSession::default())
    }

    /// Switch to the first-person camera the prior expects
    fn prepare(&mut self) {
        info!("Game window is active, setting up first-person view...");
        fire(self.io.actuator.tap(Key::End));
        for _ in 0..5 {
            fire(self.io.actuator.tap(Key::Home));
            self.io.clock.sleep(PREPARATION_GAP);
        }

        self.prepared = true;
        info!("Ready to fish");
    }

    fn cast(&mut self) -> FishingSession {
        info!("Trying to start fishing in {:?}...", self.config.cast_wait);
        self.io.clock.sleep(self.config.cast_wait);

        fire(self.io.actuator.move_to(REST_POINT));
        fire(self.io.actuator.tap(self.config.key));
        let cast_start_time = self.io.clock.now();

        self.io.clock.sleep(self.config.show_up);
        let frame = self
            .io
            .source
            .capture(None)
            .inspect_err(|e| warn!("Skipping bobber detection: {e}"))
            .ok();

        info!("Cast done, looking for the bobber");
        FishingSession {
            phase: Phase::DetectingBobber,
            cast_start_time: Some(cast_start_time),
            last_known_bobber_position: None,
            frame,
        }
    }

    fn detect_bobber(&mut self, mut session: FishingSession) -> FishingSession {
        let Some(frame) = session.frame.take() else {
            info!("No frame to look at, casting again");
            return FishingSession::casting();
        };

        match self.find_bobber(&frame) {
            Ok(Some(bobber)) => {
                info!("Bobber found at {bobber}, watching for a splash");
                self.snapshot(bobber, frame, "bobber");

                FishingSession {
                    last_known_bobber_position: Some(bobber),
                    ..session.with_phase(Phase::WatchingSplash)
                }
            }
            Ok(None) => {
                info!("Bobber not found, casting again");
                FishingSession::casting()
            }
            Err(e) => {
                warn!("Bobber detection failed: {e}");
                FishingSession::casting()
            }
        }
    }

    fn find_bobber(&mut self, frame: &RgbImage) -> Result<Option<Point>, Error> {
        let mask = self.perception.bobber_model.infer(frame)?;
        let threshold = self.config.bobber_threshold;
        let (width, height) = frame.dimensions();

        let prior = self.prior_for(&mask);
        locate_bobber(mask, prior, threshold, &Dimensions { width, height })
    }

    /// Prior at the mask resolution, resized once per resolution
    fn prior_for(&mut self, mask: &ProbabilityMask) -> Option<&PriorMask> {
        let prior = self.perception.prior.as_ref()?;
        let dims = mask.dimensions();

        if self
            .resized_prior
            .as_ref()
            .is_none_or(|p| p.dimensions() != dims)
        {
            self.resized_prior = Some(prior.resized(&dims));
        }

        self.resized_prior.as_ref()
    }

    fn watch_splash(&mut self, session: FishingSession) -> FishingSession {
        let (Some(bobber), Some(cast_start_time)) =
            (session.last_known_bobber_position, session.cast_start_time)
        else {
            return FishingSession::casting();
        };

        let region = Region::around(
            &bobber,
            self.config.crop_half_size,
            &self.io.source.dimensions(),
        );
        let probability = self
            .io
            .source
            .capture(Some(&region))
            .and_then(|crop| self.perception.splash_model.infer(&crop));

        let elapsed = self.io.clock.now().saturating_duration_since(cast_start_time);
        let decision = match probability {
            Ok(raw) => {
                debug!("Raw splash probability {raw:.2} after {elapsed:?}");
                evaluate_splash(
                    f64::from(raw),
                    elapsed.as_secs_f64(),
                    self.config.max_lifetime.as_secs_f64(),
                    self.config.splash_threshold,
                )
            }
            Err(e) => {
                warn!("Skipping splash check: {e}");
                if elapsed > self.config.max_lifetime {
                    SplashDecision::Expire
                } else {
                    SplashDecision::Wait
                }
            }
        };

        match decision {
            SplashDecision::Wait => session,
            SplashDecision::Expire => {
                info!("Bobber lifetime exceeded, casting again");
                FishingSession::casting()
            }
            SplashDecision::Act => {
                info!("Splash detected after {elapsed:?}, reeling in");
                session.with_phase(Phase::Looting)
            }
        }
    }

    fn loot(&mut self, session: FishingSession) -> FishingSession {
        let Some(bobber) = session.last_known_bobber_position else {
            return FishingSession::casting();
        };

        fire(self.io.actuator.click(bobber, Button::Right));
        self.io.clock.sleep(self.config.loot_settle);
        fire(self.io.actuator.move_to(REST_POINT));

        match self.io.source.capture(None) {
            Ok(frame) => match self.perception.loot.locate(&frame) {
                Some(loot) => {
                    info!("Loot found at {loot}");
                    self.snapshot(loot, frame, "loot");

                    fire(self.io.actuator.move_to(loot));
                    for _ in 0..self.config.loot_clicks {
                        self.io.clock.sleep(self.config.loot_gap);
                        fire(self.io.actuator.click(loot, Button::Right));
                    }
                }
                None => info!("Loot not found"),
            },
            Err(e) => warn!("Skipping looting: {e}"),
        }

        info!("Fishing is done, casting again");
        FishingSession::casting()
    }

    fn snapshot(&self, point: Point, frame: RgbImage, kind: &str) {
        if let Some(directory) = &self.config.snapshots {
            point.draw_async(
                Arc::new(frame),
                directory.join(kind).join(format!("{}.png", unix_millis())),
                false,
            );
        }
    }
}
