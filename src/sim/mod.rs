pub mod assign;
pub mod entity;
pub mod garden;
pub mod particle;

use std::time::Instant;

use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, Mode},
    error::SourceError,
    gesture,
    types::{Detection, DetectionFrame, Handedness, Point},
};

use self::{
    assign::{Assignment, Observation, assign},
    entity::{Entity, EntityRecord, TrackingParams, sweep_idle},
    garden::{Garden, GardenSnapshot},
    particle::{Element, Particle, aim_between},
};

const ASH_PER_BURN: usize = 2;

/// Serializable per-tick state handed to the transport side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateSnapshot {
    Puppets {
        entities: Vec<EntityRecord>,
    },
    Garden {
        garden: GardenSnapshot,
        particles: Vec<Particle>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub hands: usize,
    /// Detections were unusable and the tick ran with none.
    pub degraded: bool,
    pub assignment: Option<Assignment>,
    pub spawned: usize,
    pub absorbed: usize,
    pub ash: usize,
}

/// All mutable simulation state. Owned by the simulation thread.
pub struct Simulation<R: Rng = StdRng> {
    mode: Mode,
    tracking: TrackingParams,
    puppet_y_offset: f32,
    fire_speed: f32,
    frame_size: (u32, u32),
    puppets: [Entity; 2],
    particles: Vec<Particle>,
    garden: Garden,
    rng: R,
}

impl<R: Rng> Simulation<R> {
    pub fn new(config: &Config, variant_count: usize, now: Instant, mut rng: R) -> Self {
        let [left, right] = config.puppet_start_x;
        let puppets = [
            Entity::new(0, Point::new(left, 0.5), now),
            Entity::new(1, Point::new(right, 0.5), now),
        ];
        let garden = Garden::new(config.garden(), variant_count, &mut rng);

        Self {
            mode: config.mode,
            tracking: config.tracking(),
            puppet_y_offset: config.puppet_y_offset,
            fire_speed: config.fire_speed,
            frame_size: (config.frame_width, config.frame_height),
            puppets,
            particles: Vec::new(),
            garden,
            rng,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    pub fn puppets(&self) -> &[Entity; 2] {
        &self.puppets
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn garden(&self) -> &Garden {
        &self.garden
    }

    /// Runs one detect-to-simulate step. Detection errors never escape: the
    /// tick proceeds as if no hands were seen.
    pub fn tick(&mut self, input: Result<DetectionFrame, SourceError>, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let frame = match input {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!("ignoring detections for this tick: {err}");
                report.degraded = true;
                None
            }
        };

        let (width, height) = frame
            .as_ref()
            .map(|f| (f.width, f.height))
            .unwrap_or(self.frame_size);
        let hands: &[Detection] = frame.as_ref().map(|f| f.hands.as_slice()).unwrap_or(&[]);
        report.hands = hands.len();

        match self.mode {
            Mode::Puppets => {
                report.assignment = Some(self.step_puppets(hands, width, height, now));
            }
            Mode::Garden => {
                report.spawned = self.spawn_from_hands(hands, width, height);
                let (absorbed, ash) = self.step_particles();
                report.absorbed = absorbed;
                report.ash = ash;
            }
        }

        report
    }

    fn step_puppets(
        &mut self,
        hands: &[Detection],
        width: u32,
        height: u32,
        now: Instant,
    ) -> Assignment {
        let observations: Vec<Observation> = hands
            .iter()
            .take(2)
            .map(|hand| {
                let wrist = hand.landmarks.wrist();
                let pixels = hand.landmarks.to_pixels(width, height);
                let gesture = if log::log_enabled!(log::Level::Trace) {
                    let detail = gesture::analyze(&pixels);
                    log::trace!(
                        "{} hand: {}{} fingers {:?} pinch {:.2}",
                        hand.handedness.label(),
                        detail.primary.emoji(),
                        detail.primary.label(),
                        detail.finger_states,
                        detail.pinch_ratio
                    );
                    detail.primary
                } else {
                    gesture::classify(&pixels)
                };
                Observation {
                    target: Point::new(wrist.x, wrist.y - self.puppet_y_offset),
                    gesture,
                }
            })
            .collect();

        let assignment = assign(
            &mut self.puppets,
            &observations,
            &self.tracking,
            now,
            &mut self.rng,
        );
        sweep_idle(&mut self.puppets, now, self.tracking.inactivity_timeout);
        assignment
    }

    /// Open right hands breathe fire along the fingers, open left hands rain
    /// water. One particle per landmark.
    fn spawn_from_hands(&mut self, hands: &[Detection], width: u32, height: u32) -> usize {
        let mut spawned = 0;
        for hand in hands {
            let element = match hand.handedness {
                Handedness::Right => Element::Fire,
                Handedness::Left => Element::Water,
                Handedness::Unknown => continue,
            };
            // Openness is judged in normalized space so frame aspect can't
            // flip diagonal fingers.
            if !gesture::is_hand_open(&hand.landmarks) {
                continue;
            }
            let pixels = hand.landmarks.to_pixels(width, height);

            let aim = match element {
                Element::Fire => aim_between(pixels.wrist(), pixels.middle_tip(), self.fire_speed),
                _ => None,
            };
            for point in pixels.points() {
                self.particles
                    .push(Particle::spawn(*point, element, aim, &mut self.rng));
                spawned += 1;
            }
        }
        spawned
    }

    /// Advances every particle, lets the garden react, and keeps survivors.
    fn step_particles(&mut self) -> (usize, usize) {
        let current = std::mem::take(&mut self.particles);
        let mut survivors = Vec::with_capacity(current.len());
        let mut absorbed = 0;
        let mut ash = 0;

        for particle in current {
            let particle = particle.advance();
            let outcome = self.garden.interact(&particle, &mut self.rng);
            if outcome.spawn_ash {
                for _ in 0..ASH_PER_BURN {
                    survivors.push(Particle::spawn(
                        particle.position,
                        Element::Ash,
                        None,
                        &mut self.rng,
                    ));
                }
                ash += ASH_PER_BURN;
            }
            if outcome.absorbed {
                absorbed += 1;
            } else if particle.is_alive() {
                survivors.push(particle);
            }
        }

        self.particles = survivors;
        (absorbed, ash)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        match self.mode {
            Mode::Puppets => StateSnapshot::Puppets {
                entities: self.puppets.iter().map(Entity::record).collect(),
            },
            Mode::Garden => StateSnapshot::Garden {
                garden: self.garden.snapshot(),
                particles: self.particles.clone(),
            },
        }
    }
}
