use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{Gesture, Point};

#[derive(Clone, Copy, Debug)]
pub struct TrackingParams {
    /// Exponential smoothing factor applied on every update.
    pub smoothing: f32,
    /// Half-width of the uniform shake added to angry puppets.
    pub angry_jitter: f32,
    pub inactivity_timeout: Duration,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            smoothing: 0.2,
            angry_jitter: 0.01,
            inactivity_timeout: Duration::from_millis(500),
        }
    }
}

/// A persistent puppet driven by at most one hand per tick.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: usize,
    pub position: Point,
    pub state: Gesture,
    pub last_update: Instant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub state: Gesture,
}

impl Entity {
    pub fn new(id: usize, position: Point, now: Instant) -> Self {
        Self {
            id,
            position,
            state: Gesture::Neutral,
            last_update: now,
        }
    }

    pub fn update<R: Rng + ?Sized>(
        &mut self,
        target: Point,
        gesture: Gesture,
        params: &TrackingParams,
        now: Instant,
        rng: &mut R,
    ) {
        let alpha = params.smoothing;
        self.position.x += (target.x - self.position.x) * alpha;
        self.position.y += (target.y - self.position.y) * alpha;
        self.state = gesture;
        self.last_update = now;

        if self.state == Gesture::Angry && params.angry_jitter > 0.0 {
            let j = params.angry_jitter;
            self.position.x += rng.random_range(-j..=j);
            self.position.y += rng.random_range(-j..=j);
        }
    }

    /// Resets the state to `Neutral` once the entity has gone unseen for longer
    /// than `timeout`. Position is left where it was.
    pub fn expire_if_idle(&mut self, now: Instant, timeout: Duration) -> bool {
        let idle = now.saturating_duration_since(self.last_update);
        if idle > timeout && self.state != Gesture::Neutral {
            self.state = Gesture::Neutral;
            return true;
        }
        false
    }

    pub fn record(&self) -> EntityRecord {
        EntityRecord {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            state: self.state,
        }
    }
}

pub fn sweep_idle(entities: &mut [Entity], now: Instant, timeout: Duration) {
    for entity in entities.iter_mut() {
        if entity.expire_if_idle(now, timeout) {
            log::debug!("puppet {} idle, back to neutral", entity.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn smoothing_moves_a_fifth_of_the_way() {
        let now = Instant::now();
        let mut entity = Entity::new(0, Point::new(0.0, 0.0), now);
        entity.update(
            Point::new(1.0, 0.5),
            Gesture::Happy,
            &TrackingParams::default(),
            now,
            &mut rng(),
        );
        assert!((entity.position.x - 0.2).abs() < 1e-6);
        assert!((entity.position.y - 0.1).abs() < 1e-6);
        assert_eq!(entity.state, Gesture::Happy);
    }

    #[test]
    fn smoothing_never_overshoots() {
        let now = Instant::now();
        let params = TrackingParams::default();
        let mut r = rng();
        let targets = [
            Point::new(0.9, 0.1),
            Point::new(0.0, 1.0),
            Point::new(0.5, 0.5),
            Point::new(-0.3, 0.7),
        ];
        let mut entity = Entity::new(0, Point::new(0.25, 0.5), now);
        for _ in 0..20 {
            for target in targets {
                let old = entity.position;
                entity.update(target, Gesture::Shy, &params, now, &mut r);
                assert!(old.distance(entity.position) <= old.distance(target) + 1e-6);
            }
        }
    }

    #[test]
    fn angry_entities_shake_within_jitter() {
        let now = Instant::now();
        let params = TrackingParams::default();
        let mut r = rng();
        let mut moved = false;
        for _ in 0..10 {
            let mut entity = Entity::new(0, Point::new(0.5, 0.5), now);
            entity.update(Point::new(0.5, 0.5), Gesture::Angry, &params, now, &mut r);
            assert!((entity.position.x - 0.5).abs() <= 0.011);
            assert!((entity.position.y - 0.5).abs() <= 0.011);
            moved |= entity.position != Point::new(0.5, 0.5);
        }
        assert!(moved);
    }

    #[test]
    fn idle_entities_return_to_neutral() {
        let start = Instant::now();
        let params = TrackingParams::default();
        let mut entity = Entity::new(1, Point::new(0.3, 0.4), start);
        entity.update(Point::new(0.3, 0.4), Gesture::Dancing, &params, start, &mut rng());
        let before = entity.position;

        let mut entities = [entity];
        sweep_idle(&mut entities, start + Duration::from_millis(400), params.inactivity_timeout);
        assert_eq!(entities[0].state, Gesture::Dancing);

        sweep_idle(&mut entities, start + Duration::from_millis(501), params.inactivity_timeout);
        assert_eq!(entities[0].state, Gesture::Neutral);
        assert_eq!(entities[0].position, before);
    }

    #[test]
    fn record_mirrors_entity() {
        let now = Instant::now();
        let entity = Entity::new(1, Point::new(0.25, 0.5), now);
        assert_eq!(
            entity.record(),
            EntityRecord {
                id: 1,
                x: 0.25,
                y: 0.5,
                state: Gesture::Neutral
            }
        );
    }
}
