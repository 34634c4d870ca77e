use std::{
    thread,
    time::{Duration, Instant},
};

use rand::{Rng, rngs::StdRng};

use super::{
    catalog::Catalog,
    compositor::Compositor,
    publisher::{PushOutcome, SnapshotQueue, TickOutput},
    source::HandSource,
};
use crate::sim::{Simulation, TickReport};

const STATS_EVERY: u64 = 600;

/// Owns the simulation and drives it from the main thread.
pub struct Runner<R: Rng = StdRng> {
    source: Box<dyn HandSource>,
    sim: Simulation<R>,
    catalog: Catalog,
    compositor: Compositor,
    queue: SnapshotQueue,
    tick_interval: Duration,
    sequence: u64,
    evicted: u64,
    degraded: u64,
}

impl<R: Rng> Runner<R> {
    pub fn new(
        source: Box<dyn HandSource>,
        sim: Simulation<R>,
        catalog: Catalog,
        queue: SnapshotQueue,
        tick_interval: Duration,
    ) -> Self {
        Self {
            source,
            sim,
            catalog,
            compositor: Compositor::new(),
            queue,
            tick_interval,
            sequence: 0,
            evicted: 0,
            degraded: 0,
        }
    }

    /// Runs one acquire, simulate, render, hand-off cycle. Returns `None`
    /// once the source is exhausted.
    pub fn step(&mut self) -> Option<TickReport> {
        let now = Instant::now();
        let mut input = match self.source.next_frame() {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => return None,
            Err(err) => Err(err),
        };
        let background = input.as_mut().ok().and_then(|f| f.background.take());

        let report = self.sim.tick(input, now);
        let frame = self.compositor.render(&self.sim, &self.catalog, background);

        self.sequence += 1;
        let outcome = self.queue.push(TickOutput {
            sequence: self.sequence,
            state: self.sim.snapshot(),
            frame,
        });
        if outcome == PushOutcome::Evicted {
            self.evicted += 1;
            log::debug!("publisher behind, dropped oldest snapshot before tick {}", self.sequence);
        }
        if report.degraded {
            self.degraded += 1;
        }
        if self.sequence % STATS_EVERY == 0 {
            log::debug!(
                "tick {}: {} particles, {} evicted, {} degraded",
                self.sequence,
                self.sim.particles().len(),
                self.evicted,
                self.degraded
            );
        }
        Some(report)
    }

    /// Ticks until the source runs dry.
    pub fn run(mut self) -> u64 {
        log::info!(
            "running {} mode from {} source",
            self.sim.mode().label(),
            self.source.label()
        );
        while self.step().is_some() {
            thread::sleep(self.tick_interval);
        }
        log::info!("source exhausted after {} ticks", self.sequence);
        self.sequence
    }
}
