use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Life at or below this counts as spent; absorbs accumulated f32 error.
const LIFE_EPSILON: f32 = 1e-4;
const WATER_GRAVITY: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Fire,
    Water,
    Ash,
}

impl Element {
    pub fn decay(&self) -> f32 {
        match self {
            Element::Fire => 0.06,
            Element::Water => 0.04,
            Element::Ash => 0.03,
        }
    }

    pub fn gravity(&self) -> f32 {
        match self {
            Element::Water => WATER_GRAVITY,
            Element::Fire | Element::Ash => 0.0,
        }
    }
}

/// A short-lived pixel-space particle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub element: Element,
    pub position: Point,
    pub velocity: Point,
    /// Remaining life in [0, 1].
    pub life: f32,
    pub decay: f32,
    pub size: u32,
}

impl Particle {
    /// Creates a particle at `origin`. `aim` only steers fire; other elements
    /// ignore it.
    pub fn spawn<R: Rng + ?Sized>(
        origin: Point,
        element: Element,
        aim: Option<Point>,
        rng: &mut R,
    ) -> Self {
        let (velocity, size): (Point, u32) = match element {
            Element::Fire => {
                let velocity = match aim {
                    Some(aim) => Point::new(
                        aim.x + rng.random_range(-2.0..=2.0),
                        aim.y + rng.random_range(-2.0..=2.0),
                    ),
                    None => Point::new(
                        rng.random_range(-2.0..=2.0),
                        rng.random_range(-9.0..=-4.0),
                    ),
                };
                (velocity, rng.random_range(4..=10))
            }
            Element::Water => (
                Point::new(rng.random_range(-0.5..=0.5), rng.random_range(5.0..=15.0)),
                rng.random_range(2..=5),
            ),
            Element::Ash => (
                Point::new(rng.random_range(-1.0..=1.0), rng.random_range(-3.0..=-1.0)),
                rng.random_range(2..=5),
            ),
        };

        Self {
            element,
            position: origin,
            velocity,
            life: 1.0,
            decay: element.decay(),
            size,
        }
    }

    /// One simulation step: decay, gravity, then motion.
    #[must_use]
    pub fn advance(mut self) -> Self {
        self.life -= self.decay;
        if self.life <= LIFE_EPSILON {
            self.life = 0.0;
        }
        self.velocity.y += self.element.gravity();
        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }
}

/// Unit vector from `from` to `to` scaled to `speed`, or `None` when the two
/// points coincide.
pub fn aim_between(from: Point, to: Point, speed: f32) -> Option<Point> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if !len.is_finite() || len <= f32::EPSILON {
        return None;
    }
    Some(Point::new(dx / len * speed, dy / len * speed))
}
