use std::process::exit;
use std::thread::spawn;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info, warn};
use rdev::EventType::KeyPress;
use rdev::{Event, Key, listen};
use splashy::{
    GAME_EXECUTABLE, ScreenRecorder,
    args::Args,
    bot::{Collaborators, FishingBot, Perception},
    check_running,
    controllers::{EnigoActuator, ProcessWindowGate, SystemClock},
    logger::TeeLogger,
    models::{BobberModel, ColorBobberModel, FoamSplashModel, Recorded, SplashModel, VisionModel},
    perception::{LootLocalizer, PriorMask},
    raise,
};

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    let log_file = (!args.no_log_file).then_some(args.log_file.as_path());
    TeeLogger::new(level, log_file)
        .with_context(|| format!("Failed to open {}", args.log_file.display()))?
        .init()
        .unwrap_or_else(|err| eprintln!("Failed initialize logger: {err}"));
    info!("Starting fishing bot");

    // Notice
    warn!(
        r"To make this program work:
                                        - run the game maximised on your primary screen
                                        - disable auto loot
                                        - if asked, share your whole screen"
    );

    if check_running(GAME_EXECUTABLE) {
        info!("Game found.");
    } else {
        warn!("{GAME_EXECUTABLE} isn't running yet.");
    }

    match raise(&args.window) {
        Ok(()) => info!("Raised {} window", args.window),
        Err(err) => warn!("Failed raising {} window: {err}", args.window),
    }

    // Register keybinds to close the script
    register_keybinds();

    let recorder = ScreenRecorder::new().context("Failed to initialize screen monitoring")?;
    let screen = recorder.dimensions();
    info!(
        "Detected screen dimensions: {}x{}",
        screen.width, screen.height
    );

    let actuator = EnigoActuator::new().context("Failed to initialize I/O engine")?;
    let loot = LootLocalizer::from_path(
        &args.template,
        (args.loot_offset_x, args.loot_offset_y),
        args.loot_max_error,
    )
    .context("Failed to load the loot icon")?;
    let icon = loot.template_dimensions();
    info!("Loot icon is {}x{}", icon.width, icon.height);
    let (bobber_model, splash_model) = load_models(&args)?;
    let prior = (!args.no_prior).then(|| PriorMask::gaussian(screen.height, screen.width));

    let mut bot = FishingBot::new(
        args.config(),
        Collaborators {
            source: Box::new(recorder),
            actuator: Box::new(actuator),
            gate: Box::new(ProcessWindowGate::new(&args.window)),
            clock: Box::new(SystemClock),
        },
        Perception {
            bobber_model,
            splash_model,
            loot,
            prior,
        },
    );

    if let Err(err) = bot.run() {
        error!("{err}");
        return Err(err.into());
    }

    Ok(())
}

/// Bundled models, tuned by checkpoints when given
fn load_models(args: &Args) -> Result<(Box<BobberModel>, Box<SplashModel>)> {
    let bobber = match &args.bobber_checkpoint {
        Some(path) => ColorBobberModel::from_checkpoint(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ColorBobberModel::default(),
    };
    let splash = match &args.splash_checkpoint {
        Some(path) => FoamSplashModel::from_checkpoint(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => FoamSplashModel::default(),
    };
    info!("Using {} and {}", bobber.name(), splash.name());

    let bobber: Box<BobberModel> = if args.save_data {
        Box::new(Recorded::new(bobber, "logs"))
    } else {
        Box::new(bobber)
    };
    let splash: Box<SplashModel> = if args.save_data {
        Box::new(Recorded::new(splash, "logs"))
    } else {
        Box::new(splash)
    };

    Ok((bobber, splash))
}

fn register_keybinds() {
    spawn(|| {
        let listening = listen(|e| {
            if let Event {
                event_type: KeyPress(Key::Escape),
                ..
            } = e
            {
                info!("Closing due to key press...");
                exit(0)
            }
        });

        if let Err(err) = listening {
            error!("Can't listen to keyboard, <Esc> won't stop the bot: {err:?}");
        }
    });
}
