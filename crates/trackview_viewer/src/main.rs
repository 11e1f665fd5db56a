//! Trackview Viewer
//!
//! Runs the frame pipeline headless against a demo scene. The optional first
//! argument is a TOML settings file.
//!
//! Run with: cargo run -p trackview_viewer -- viewer.toml
//!
//! Set `TRACKVIEW_DEBUGGER=1` to let draw failures propagate instead of being
//! contained.

mod scene;

use std::thread;
use std::time::{Duration, Instant};

use trackview_kernel::{
    build_updater, PipelineResult, RenderScheduler, TickOutcome, ViewerSettings,
};
use trackview_render::HeadlessDevice;

use crate::scene::{DemoScene, DemoSubsystem, LogScreenListener};

/// Frame interval when vertical sync is on
const VSYNC_INTERVAL: Duration = Duration::from_micros(16_667);

/// Frames between status lines
const STATUS_INTERVAL: u64 = 300;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("Viewer failed: {}", e);
        std::process::exit(1);
    }
}

fn load_settings() -> PipelineResult<ViewerSettings> {
    match std::env::args().nth(1) {
        Some(path) => Ok(ViewerSettings::load(path)?),
        None => {
            log::info!("No settings file given, using defaults");
            Ok(ViewerSettings::default())
        }
    }
}

fn run() -> PipelineResult<()> {
    let mut settings = load_settings()?;
    settings.validate()?;

    let (width, height) = settings.window_size()?;
    let scene = DemoScene::new(
        settings.viewing_fov,
        width as f32 / height as f32,
        settings.viewing_distance,
    );
    let updater = build_updater(settings.threaded_updater, scene)?;
    let vertical_sync = settings.vertical_sync;

    let mut scheduler = RenderScheduler::new(settings, HeadlessDevice::new((width, height)), updater)
        .with_loader(Box::new(DemoSubsystem::new("Asset loader")))
        .with_audio(Box::new(DemoSubsystem::new("Audio")))
        .with_screen_listener(Box::new(LogScreenListener));

    // Install signal handler for graceful shutdown
    let signals = scheduler.signals().clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        signals.request_stop();
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    scheduler.initialize()?;
    scheduler.signals().set_mouse_visible(true);
    log::info!("Viewer running. Press Ctrl+C to exit.");

    loop {
        let started = Instant::now();
        if scheduler.tick()? == TickOutcome::Terminated {
            break;
        }

        let frames = scheduler.frames_drawn();
        if frames % STATUS_INTERVAL == 0 {
            let stats = scheduler.statistics();
            log::info!(
                "{} frames, {:.1} fps, {:.2} ms (p99 {:.2} ms), {} primitives, {} shadow casters",
                frames,
                stats.frame_rate.value(),
                stats.frame_time.value() * 1000.0,
                stats.frame_time.p99() * 1000.0,
                scheduler.last_frame_counters().total(),
                scheduler.last_frame_counters().shadow_total()
            );
        }

        if vertical_sync {
            if let Some(rest) = VSYNC_INTERVAL.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }

    log::info!(
        "Viewer exited after {} frames ({} contained faults)",
        scheduler.frames_drawn(),
        scheduler.contained_faults()
    );
    Ok(())
}
