//! Adaptive request/consume cycle for arena frames
//!
//! The pacer keeps at most `budget` frame requests in flight on the bound
//! channel. Each received frame earns one replacement request, issued the
//! next time the cycle runs (after a delivery). Between two animation ticks
//! only one frame is kept: a newer arrival replaces the pending one.
//!
//! A periodic measurement compares the average delivered frame rate against
//! the configured thresholds and grows or shrinks the budget by one.

use crate::channel::{Channel, ChannelId, Frame};
use crate::config::PacerConfig;
use crate::presenter::Presenter;
use crate::window::{FpsAccumulator, TimestampWindow};
use log::{debug, info};
use shared::Push;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingStats {
    pub fps: Option<u32>,
    pub budget: u32,
}

/// What happened to a frame handed to [`FramePacer::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A tick was waiting; the frame went straight to the presenter.
    Delivered,
    /// Stored as the pending frame for the next tick.
    Buffered,
    /// Not bound to this channel, or already ejected.
    Discarded,
    /// The local player's entity is gone. Reported once per binding.
    Ejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Stopped,
    /// Requests issued, waiting for the host refresh callback.
    AwaitingTick,
    /// The tick fired with nothing pending; the next frame is delivered on arrival.
    AwaitingFrame,
    Ejected,
}

pub struct FramePacer {
    config: PacerConfig,
    binding: Option<ChannelId>,
    cycle: Cycle,
    budget: u32,
    // Requests to issue on the next cycle. May dip below zero after a budget
    // decrease, which swallows the next replacement request.
    owed: i64,
    // Frames received since the last measurement.
    arrivals: u32,
    pending: Option<Frame>,
    timestamps: TimestampWindow,
    fps: FpsAccumulator,
    last_fps: Option<u32>,
    next_measurement: Option<Instant>,
}

impl FramePacer {
    pub fn new(config: PacerConfig) -> Self {
        let timestamps = TimestampWindow::new(config.window_capacity);
        let budget = config.initial_budget;
        Self {
            config,
            binding: None,
            cycle: Cycle::Stopped,
            budget,
            owed: budget as i64,
            arrivals: 0,
            pending: None,
            timestamps,
            fps: FpsAccumulator::default(),
            last_fps: None,
            next_measurement: None,
        }
    }

    /// Binds to a live channel and immediately issues `initial_budget` requests.
    pub fn start<C: Channel>(&mut self, channel: &mut C, now: Instant) {
        self.stop();
        self.binding = Some(channel.id());
        self.next_measurement = Some(now + self.config.measurement_interval);
        info!(
            "Frame pacer started on channel {} with budget {}",
            channel.id(),
            self.budget
        );
        self.run_cycle(channel);
    }

    /// Detaches from the channel and resets every field. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(id) = self.binding.take() {
            debug!("Frame pacer stopped on channel {}", id);
        }
        self.cycle = Cycle::Stopped;
        self.budget = self.config.initial_budget;
        self.owed = self.budget as i64;
        self.arrivals = 0;
        self.pending = None;
        self.timestamps.clear();
        self.fps.reset();
        self.last_fps = None;
        self.next_measurement = None;
    }

    pub fn is_running(&self) -> bool {
        self.binding.is_some()
    }

    pub fn is_ejected(&self) -> bool {
        self.cycle == Cycle::Ejected
    }

    pub fn binding(&self) -> Option<ChannelId> {
        self.binding
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_awaiting_frame(&self) -> bool {
        self.cycle == Cycle::AwaitingFrame
    }

    pub fn timestamps(&self) -> &TimestampWindow {
        &self.timestamps
    }

    pub fn stats(&self) -> PacingStats {
        PacingStats {
            fps: self.last_fps,
            budget: self.budget,
        }
    }

    /// When the next rate measurement is due, if the pacer is running.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_measurement
    }

    pub fn on_frame<C: Channel, P: Presenter>(
        &mut self,
        channel: &mut C,
        frame: Frame,
        now: Instant,
        presenter: &mut P,
    ) -> FrameOutcome {
        if self.binding != Some(channel.id()) {
            debug!("Discarding frame for unbound channel {}", channel.id());
            return FrameOutcome::Discarded;
        }
        if matches!(self.cycle, Cycle::Stopped | Cycle::Ejected) {
            return FrameOutcome::Discarded;
        }

        if !frame.player_present {
            info!("Player entity removed, halting frame requests");
            self.cycle = Cycle::Ejected;
            self.pending = None;
            self.next_measurement = None;
            return FrameOutcome::Ejected;
        }

        self.arrivals = self.arrivals.saturating_add(1);
        self.owed = (self.owed + 1).min(self.budget as i64);

        if self.cycle == Cycle::AwaitingFrame {
            self.deliver(channel, frame, now, presenter);
            FrameOutcome::Delivered
        } else {
            if self.pending.replace(frame).is_some() {
                debug!("Pending frame replaced before tick");
            }
            FrameOutcome::Buffered
        }
    }

    /// Host refresh callback. Only acts when the pacer asked for a tick.
    pub fn on_animation_frame<C: Channel, P: Presenter>(
        &mut self,
        channel: &mut C,
        now: Instant,
        presenter: &mut P,
    ) {
        if self.binding != Some(channel.id()) || self.cycle != Cycle::AwaitingTick {
            return;
        }

        match self.pending.take() {
            Some(frame) => self.deliver(channel, frame, now, presenter),
            None => self.cycle = Cycle::AwaitingFrame,
        }
    }

    /// Runs the rate adaptation if its deadline has passed, and re-issues
    /// requests presumed lost when a whole interval went by without a frame.
    pub fn on_timer<C: Channel, P: Presenter>(
        &mut self,
        channel: &mut C,
        now: Instant,
        presenter: &mut P,
    ) {
        if self.binding != Some(channel.id()) {
            return;
        }
        let Some(due) = self.next_measurement else {
            return;
        };
        if now < due {
            return;
        }

        let interval = self.config.measurement_interval;
        let mut next = due + interval;
        if next <= now {
            next = now + interval;
        }
        self.next_measurement = Some(next);

        self.adapt(presenter);
        self.recover_lost_requests(channel);
    }

    fn recover_lost_requests<C: Channel>(&mut self, channel: &mut C) {
        if self.cycle == Cycle::AwaitingFrame && self.arrivals == 0 {
            info!(
                "No frames for a full interval on channel {}, re-issuing {} requests",
                channel.id(),
                self.budget
            );
            self.owed = self.budget as i64;
            self.run_cycle(channel);
        }
        self.arrivals = 0;
    }

    fn adapt<P: Presenter>(&mut self, presenter: &mut P) {
        if let Some(average) = self.fps.average() {
            let adjusted = adjust_budget(self.budget, average, &self.config);
            if adjusted != self.budget {
                info!(
                    "Average {:.1} fps, frame budget {} -> {}",
                    average, self.budget, adjusted
                );
                self.owed += adjusted as i64 - self.budget as i64;
                self.budget = adjusted;
                presenter.on_pacing(self.stats());
            }
        }
        self.fps.reset();
    }

    fn deliver<C: Channel, P: Presenter>(
        &mut self,
        channel: &mut C,
        frame: Frame,
        now: Instant,
        presenter: &mut P,
    ) {
        presenter.on_frame(frame);

        self.timestamps.push(now);
        if let Some(fps) = self.timestamps.fps() {
            let fps = fps.round();
            self.fps.add(fps);
            self.last_fps = Some(fps as u32);
        }
        presenter.on_pacing(self.stats());

        self.run_cycle(channel);
    }

    fn run_cycle<C: Channel>(&mut self, channel: &mut C) {
        self.pending = None;
        while self.owed > 0 {
            channel.push(Push::RequestFrame);
            self.owed -= 1;
        }
        self.cycle = Cycle::AwaitingTick;
    }
}

/// One adaptation step. Thresholds are strict, so an average exactly on a
/// threshold leaves the budget alone. The result stays in `1..=max_budget`.
pub fn adjust_budget(budget: u32, average_fps: f64, config: &PacerConfig) -> u32 {
    if average_fps < config.fps_low as f64 && budget < config.max_budget {
        budget + 1
    } else if average_fps > config.fps_high as f64 && budget > 1 {
        budget - 1
    } else {
        budget
    }
}
