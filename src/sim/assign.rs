use std::time::Instant;

use rand::Rng;

use super::entity::{Entity, TrackingParams};
use crate::types::{Gesture, Point};

/// A classified hand ready to drive a puppet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// Normalized target position for the puppet.
    pub target: Point,
    pub gesture: Gesture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    Idle,
    Single { entity: usize },
    Straight,
    Crossed,
}

/// Matches up to two observations onto the two puppets with the least total
/// movement, then updates the chosen puppets. An exact tie crosses.
/// Observations past the second are ignored.
pub fn assign<R: Rng + ?Sized>(
    entities: &mut [Entity; 2],
    observations: &[Observation],
    params: &TrackingParams,
    now: Instant,
    rng: &mut R,
) -> Assignment {
    match observations {
        [] => Assignment::Idle,
        [obs] => {
            let d0 = obs.target.distance(entities[0].position);
            let d1 = obs.target.distance(entities[1].position);
            let entity = if d0 <= d1 { 0 } else { 1 };
            entities[entity].update(obs.target, obs.gesture, params, now, rng);
            Assignment::Single { entity }
        }
        [first, second, ..] => {
            let straight = first.target.distance(entities[0].position)
                + second.target.distance(entities[1].position);
            let crossed = first.target.distance(entities[1].position)
                + second.target.distance(entities[0].position);

            if straight < crossed {
                entities[0].update(first.target, first.gesture, params, now, rng);
                entities[1].update(second.target, second.gesture, params, now, rng);
                Assignment::Straight
            } else {
                entities[1].update(first.target, first.gesture, params, now, rng);
                entities[0].update(second.target, second.gesture, params, now, rng);
                Assignment::Crossed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn puppets(now: Instant) -> [Entity; 2] {
        [
            Entity::new(0, Point::new(0.75, 0.5), now),
            Entity::new(1, Point::new(0.25, 0.5), now),
        ]
    }

    fn obs(x: f32, y: f32, gesture: Gesture) -> Observation {
        Observation {
            target: Point::new(x, y),
            gesture,
        }
    }

    #[test]
    fn no_observations_leaves_puppets_alone() {
        let now = Instant::now();
        let mut entities = puppets(now);
        let result = assign(
            &mut entities,
            &[],
            &TrackingParams::default(),
            now,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(result, Assignment::Idle);
        assert_eq!(entities[0].position, Point::new(0.75, 0.5));
        assert_eq!(entities[1].position, Point::new(0.25, 0.5));
    }

    #[test]
    fn single_observation_updates_nearest_puppet_only() {
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(1);
        let params = TrackingParams::default();

        let mut entities = puppets(now);
        let observed = [obs(0.3, 0.5, Gesture::Happy)];
        let result = assign(&mut entities, &observed, &params, now, &mut rng);
        assert_eq!(result, Assignment::Single { entity: 1 });
        assert_eq!(entities[1].state, Gesture::Happy);
        assert_eq!(entities[0].state, Gesture::Neutral);
        assert_eq!(entities[0].position, Point::new(0.75, 0.5));

        let mut entities = puppets(now);
        let observed = [obs(0.9, 0.2, Gesture::Shy)];
        let result = assign(&mut entities, &observed, &params, now, &mut rng);
        assert_eq!(result, Assignment::Single { entity: 0 });
        assert_eq!(entities[1].position, Point::new(0.25, 0.5));
    }

    #[test]
    fn equidistant_single_observation_goes_to_first_puppet() {
        let now = Instant::now();
        let mut entities = puppets(now);
        let result = assign(
            &mut entities,
            &[obs(0.5, 0.5, Gesture::Dancing)],
            &TrackingParams::default(),
            now,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(result, Assignment::Single { entity: 0 });
        assert_eq!(entities[0].state, Gesture::Dancing);
    }

    #[test]
    fn detector_order_swap_is_undone() {
        let now = Instant::now();
        let mut entities = puppets(now);
        // Detector lists the left hand first; puppet 0 sits on the right.
        let result = assign(
            &mut entities,
            &[obs(0.2, 0.5, Gesture::Happy), obs(0.8, 0.5, Gesture::Shy)],
            &TrackingParams::default(),
            now,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(result, Assignment::Crossed);
        assert_eq!(entities[0].state, Gesture::Shy);
        assert_eq!(entities[1].state, Gesture::Happy);
        assert!(entities[0].position.x > 0.75);
        assert!(entities[1].position.x < 0.25);
    }

    #[test]
    fn straight_pairing_kept_when_cheaper() {
        let now = Instant::now();
        let mut entities = puppets(now);
        let result = assign(
            &mut entities,
            &[
                obs(0.7, 0.4, Gesture::Happy),
                obs(0.3, 0.6, Gesture::Neutral),
                obs(0.5, 0.5, Gesture::Angry),
            ],
            &TrackingParams::default(),
            now,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(result, Assignment::Straight);
        assert_eq!(entities[0].state, Gesture::Happy);
        assert_eq!(entities[1].state, Gesture::Neutral);
    }

    #[test]
    fn tied_pairings_cross() {
        let now = Instant::now();
        let mut entities = puppets(now);
        let result = assign(
            &mut entities,
            &[obs(0.5, 0.5, Gesture::Happy), obs(0.5, 0.5, Gesture::Shy)],
            &TrackingParams::default(),
            now,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(result, Assignment::Crossed);
        assert_eq!(entities[1].state, Gesture::Happy);
        assert_eq!(entities[0].state, Gesture::Shy);
    }
}
