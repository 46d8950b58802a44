use std::{
    io::Write,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::{arg_parser::TargetFps, renderer::FrameRenderer};

// Length of a frame rate reporting period
pub const REPORT_PERIOD: Duration = Duration::from_secs(1);

// Time source and sleep used by the pacing loop
pub trait FrameClock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

// Wall clock suspending the calling thread.
// The thread sleep keeps microsecond resolution
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadClock;

impl FrameClock for ThreadClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

// Count frames and report their number once per period
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    period_start: Instant,
}

impl FpsCounter {
    pub fn new(start: Instant) -> Self {
        Self {
            frames: 0,
            period_start: start,
        }
    }

    // Count one frame drawn at `now`.
    // When a full period has elapsed return the number of frames
    // drawn in it and start a new period at `now`
    pub fn record_frame(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;

        if now.saturating_duration_since(self.period_start) < REPORT_PERIOD {
            return None;
        }

        let fps = self.frames;

        self.frames = 0;
        self.period_start = now;

        Some(fps)
    }
}

// Draw frames at a fixed cadence until cancelled.
// The sleep between frames does not account for the drawing time,
// so the achieved rate is at most the target rate
pub struct FramePacer<R: FrameRenderer> {
    renderer: R,
    interval: Duration,

    // Only present when frame rate reporting is enabled
    counter: Option<FpsCounter>,

    frames_drawn: u64,
    // Set while the renderer keeps returning errors
    failing: bool,
}

impl<R: FrameRenderer> FramePacer<R> {
    pub fn new(renderer: R, fps: TargetFps) -> Self {
        Self {
            renderer,
            interval: fps.frame_interval(),
            counter: None,
            frames_drawn: 0,
            failing: false,
        }
    }

    // Enable the once per period frame rate report,
    // the first period starts at `start`
    pub fn with_fps_report(mut self, start: Instant) -> Self {
        self.counter = Some(FpsCounter::new(start));
        self
    }

    pub fn frame_interval(&self) -> Duration {
        self.interval
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    // Draw a single frame at `now` and return the frame rate
    // if a reporting period just ended.
    // Rendering errors are logged and never stop the pacer
    pub fn frame(&mut self, now: Instant) -> Option<u32> {
        match self.renderer.draw_frame() {
            Ok(()) if self.failing => {
                info!("Frame rendering recovered");
                self.failing = false;
            }
            Ok(()) => {}
            Err(err) if self.failing => {
                trace!("Frame rendering failed: {err}");
            }
            Err(err) => {
                warn!("Frame rendering failed, continuing: {err}");
                self.failing = true;
            }
        }

        self.frames_drawn += 1;

        self.counter
            .as_mut()
            .and_then(|counter| counter.record_frame(now))
    }

    // Run the draw-sleep loop on the calling thread until the token is
    // cancelled, writing "FPS: <n>" lines to `out`.
    // Return the number of frames drawn
    pub fn run<C: FrameClock, W: Write>(
        &mut self,
        run_token: &CancellationToken,
        clock: &mut C,
        out: &mut W,
    ) -> Result<u64> {
        info!(
            "Frame pacer: Running, one frame every {:?}",
            self.interval
        );

        while !run_token.is_cancelled() {
            if let Some(fps) = self.frame(clock.now()) {
                writeln!(out, "FPS: {fps}")
                    .and_then(|_| out.flush())
                    .with_context(|| "Failed to write frame rate report")?;
            }

            clock.sleep(self.interval);
        }

        info!("Frame pacer: Quitting");

        Ok(self.frames_drawn)
    }
}
