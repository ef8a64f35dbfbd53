//! Frame pacing.
//!
//! A pacer is the host's source of frame callbacks. The runtime requests a
//! frame, waits for the pacer to fire it, runs the frame and requests the
//! next one. Pausing cancels the outstanding request.

use crate::settings::RuntimeSettings;
use crate::time::frame_interval;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Opaque handle to a requested frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

pub trait FramePacer: Send {
    /// Ask for one frame callback.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraw a request that has not fired yet. Unknown handles are ignored.
    fn cancel_frame(&mut self, request: FrameRequest);

    /// Wait for the next requested frame and report its timestamp in
    /// milliseconds. Resolves to `None` when nothing is requested.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<(FrameRequest, f64)>>;
}

/// Outstanding requests in the order they were made.
#[derive(Debug, Default)]
struct Requested {
    queue: VecDeque<FrameRequest>,
    next_id: u64,
}

impl Requested {
    fn push(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_id);
        self.next_id += 1;
        self.queue.push_back(request);
        request
    }

    fn cancel(&mut self, request: FrameRequest) {
        self.queue.retain(|&queued| queued != request);
    }

    fn pop(&mut self) -> Option<FrameRequest> {
        self.queue.pop_front()
    }
}

/// Fires requested frames on a fixed tokio interval.
pub struct IntervalPacer {
    period: Duration,
    interval: Option<Interval>,
    origin: Instant,
    requested: Requested,
}

impl IntervalPacer {
    pub fn new(frame_rate_hz: u32) -> Self {
        Self {
            period: frame_interval(frame_rate_hz),
            interval: None,
            origin: Instant::now(),
            requested: Requested::default(),
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.frame_rate_hz)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl FramePacer for IntervalPacer {
    fn request_frame(&mut self) -> FrameRequest {
        self.requested.push()
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.requested.cancel(request);
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Option<(FrameRequest, f64)>> {
        Box::pin(async move {
            let request = self.requested.pop()?;
            // Created on first use so construction does not need a reactor.
            let period = self.period;
            let interval = self.interval.get_or_insert_with(|| {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval
            });
            interval.tick().await;
            Some((request, self.origin.elapsed().as_secs_f64() * 1000.0))
        })
    }
}

/// Fires requested frames immediately with evenly spaced timestamps.
#[derive(Debug)]
pub struct ManualPacer {
    step_ms: f64,
    fired: u64,
    requested: Requested,
}

impl ManualPacer {
    pub fn new(step_ms: f64) -> Self {
        Self {
            step_ms,
            fired: 0,
            requested: Requested::default(),
        }
    }

    /// Frames fired so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl Default for ManualPacer {
    fn default() -> Self {
        Self::new(1000.0 / 60.0)
    }
}

impl FramePacer for ManualPacer {
    fn request_frame(&mut self) -> FrameRequest {
        self.requested.push()
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.requested.cancel(request);
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Option<(FrameRequest, f64)>> {
        let fired = self.requested.pop().map(|request| {
            self.fired += 1;
            (request, self.step_ms * self.fired as f64)
        });
        Box::pin(futures::future::ready(fired))
    }
}
