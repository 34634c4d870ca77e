use rand::Rng;
use serde::{Deserialize, Serialize};

use super::particle::{Element, Particle};

const WATER_GROWTH: f32 = 3.0;
const EXTINGUISH_STEP: f32 = 0.1;
const BURN_STEP: f32 = 0.05;
const BURN_DAMAGE: f32 = 8.0;
const FULLY_CHARRED: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct GardenParams {
    pub width: u32,
    pub height: u32,
    pub slot_size: u32,
    /// Thickness of the soil band at the bottom of the frame.
    pub ground_band: f32,
    /// Per-slot max height is drawn uniformly from `[min, max)`.
    pub max_height_range: (u32, u32),
}

impl Default for GardenParams {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            slot_size: 60,
            ground_band: 15.0,
            max_height_range: (200, 500),
        }
    }
}

/// One horizontal bucket of the garden.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub height: f32,
    pub char_level: f32,
    pub variant: Option<usize>,
    pub max_height: f32,
}

impl Slot {
    fn empty(max_height: f32) -> Self {
        Self {
            height: 0.0,
            char_level: 0.0,
            variant: None,
            max_height,
        }
    }

    pub fn is_planted(&self) -> bool {
        self.height > 0.0
    }

    fn clear(&mut self) {
        self.height = 0.0;
        self.char_level = 0.0;
        self.variant = None;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interaction {
    pub absorbed: bool,
    pub spawn_ash: bool,
}

impl Interaction {
    const PASS: Interaction = Interaction {
        absorbed: false,
        spawn_ash: false,
    };
    const ABSORBED: Interaction = Interaction {
        absorbed: true,
        spawn_ash: false,
    };
    const BURNED: Interaction = Interaction {
        absorbed: true,
        spawn_ash: true,
    };
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GardenSnapshot {
    pub slot_size: u32,
    pub ground_y: f32,
    pub slots: Vec<Slot>,
}

pub struct Garden {
    params: GardenParams,
    slots: Vec<Slot>,
    variant_count: usize,
}

impl Garden {
    pub fn new<R: Rng + ?Sized>(params: GardenParams, variant_count: usize, rng: &mut R) -> Self {
        let slot_size = params.slot_size.max(1);
        let num_slots = (params.width / slot_size) as usize;
        let (lo, hi) = params.max_height_range;
        let hi = hi.max(lo + 1);
        let slots = (0..num_slots)
            .map(|_| Slot::empty(rng.random_range(lo..hi) as f32))
            .collect();

        Self {
            params: GardenParams {
                slot_size,
                ..params
            },
            slots,
            variant_count,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[cfg(test)]
    pub(crate) fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot> {
        self.slots.get_mut(idx)
    }

    pub fn slot_size(&self) -> u32 {
        self.params.slot_size
    }

    /// Frame height; plants stand on this line.
    pub fn floor_y(&self) -> f32 {
        self.params.height as f32
    }

    /// Top of the soil band. Water below this line soaks in.
    pub fn ground_y(&self) -> f32 {
        self.params.height as f32 - self.params.ground_band
    }

    pub fn slot_center_x(&self, idx: usize) -> f32 {
        (idx as u32 * self.params.slot_size + self.params.slot_size / 2) as f32
    }

    pub fn slot_index(&self, x: f32) -> Option<usize> {
        if !x.is_finite() || x < 0.0 {
            return None;
        }
        let idx = (x / self.params.slot_size as f32).floor() as usize;
        (idx < self.slots.len()).then_some(idx)
    }

    /// Applies the element rules of `particle` to the slot under it.
    pub fn interact<R: Rng + ?Sized>(&mut self, particle: &Particle, rng: &mut R) -> Interaction {
        let Some(idx) = self.slot_index(particle.position.x) else {
            return Interaction::PASS;
        };

        match particle.element {
            Element::Water => {
                if particle.position.y < self.ground_y() {
                    return Interaction::PASS;
                }
                self.water(idx, rng);
                Interaction::ABSORBED
            }
            Element::Fire => {
                let floor = self.floor_y();
                let slot = &mut self.slots[idx];
                if !slot.is_planted() || particle.position.y <= floor - slot.height {
                    return Interaction::PASS;
                }
                if slot.char_level < FULLY_CHARRED {
                    slot.char_level = (slot.char_level + BURN_STEP).min(FULLY_CHARRED);
                    return Interaction::ABSORBED;
                }
                slot.height -= BURN_DAMAGE;
                if slot.height <= 0.0 {
                    log::debug!("plant in slot {idx} burned down");
                    slot.clear();
                }
                Interaction::BURNED
            }
            Element::Ash => Interaction::PASS,
        }
    }

    fn water<R: Rng + ?Sized>(&mut self, idx: usize, rng: &mut R) {
        let variant_count = self.variant_count;
        let slot = &mut self.slots[idx];

        if !slot.is_planted() {
            if variant_count == 0 {
                return;
            }
            slot.variant = Some(rng.random_range(0..variant_count));
            slot.char_level = 0.0;
        }

        if slot.char_level > 0.0 {
            slot.char_level = (slot.char_level - EXTINGUISH_STEP).max(0.0);
        } else if slot.height < slot.max_height {
            slot.height = (slot.height + WATER_GROWTH).min(slot.max_height);
        }
    }

    pub fn snapshot(&self) -> GardenSnapshot {
        GardenSnapshot {
            slot_size: self.params.slot_size,
            ground_y: self.ground_y(),
            slots: self.slots.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use rand::{SeedableRng, rngs::StdRng};

    const VARIANTS: usize = 4;

    fn garden(rng: &mut StdRng) -> Garden {
        Garden::new(GardenParams::default(), VARIANTS, rng)
    }

    fn particle(element: Element, x: f32, y: f32) -> Particle {
        Particle {
            element,
            position: Point::new(x, y),
            velocity: Point::default(),
            life: 1.0,
            decay: element.decay(),
            size: 3,
        }
    }

    #[test]
    fn slots_cover_frame_width_with_random_caps() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = garden(&mut rng);
        assert_eq!(g.slots().len(), 1280 / 60);
        for slot in g.slots() {
            assert!((200.0..500.0).contains(&slot.max_height));
            assert!(!slot.is_planted());
            assert_eq!(slot.variant, None);
        }
    }

    #[test]
    fn water_on_empty_slot_plants_a_seedling() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut g = garden(&mut rng);
        let result = g.interact(&particle(Element::Water, 130.0, 710.0), &mut rng);
        assert_eq!(result, Interaction::ABSORBED);

        let slot = &g.slots()[2];
        assert_eq!(slot.height, 3.0);
        assert!(slot.variant.is_some_and(|v| v < VARIANTS));
        assert_eq!(slot.char_level, 0.0);
    }

    #[test]
    fn water_above_ground_passes_through() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut g = garden(&mut rng);
        let result = g.interact(&particle(Element::Water, 130.0, 600.0), &mut rng);
        assert_eq!(result, Interaction::PASS);
        assert_eq!(g.slots()[2].height, 0.0);
    }

    #[test]
    fn watering_caps_at_max_height() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut g = garden(&mut rng);
        g.slots[0].max_height = 250.0;
        for _ in 0..100 {
            g.interact(&particle(Element::Water, 10.0, 719.0), &mut rng);
        }
        assert_eq!(g.slots()[0].height, 250.0);
    }

    #[test]
    fn water_extinguishes_before_growing() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut g = garden(&mut rng);
        g.slots[1] = Slot {
            height: 100.0,
            char_level: 0.15,
            variant: Some(0),
            max_height: 300.0,
        };
        g.interact(&particle(Element::Water, 70.0, 710.0), &mut rng);
        assert!((g.slots()[1].char_level - 0.05).abs() < 1e-6);
        assert_eq!(g.slots()[1].height, 100.0);

        g.interact(&particle(Element::Water, 70.0, 710.0), &mut rng);
        assert_eq!(g.slots()[1].char_level, 0.0);

        g.interact(&particle(Element::Water, 70.0, 710.0), &mut rng);
        assert_eq!(g.slots()[1].height, 103.0);
    }

    #[test]
    fn fire_chars_plant_without_ash() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut g = garden(&mut rng);
        g.slots[3] = Slot {
            height: 100.0,
            char_level: 0.0,
            variant: Some(1),
            max_height: 300.0,
        };
        let result = g.interact(&particle(Element::Fire, 200.0, 650.0), &mut rng);
        assert_eq!(result, Interaction::ABSORBED);
        assert!((g.slots()[3].char_level - 0.05).abs() < 1e-6);
        assert_eq!(g.slots()[3].height, 100.0);
    }

    #[test]
    fn fire_above_plant_passes_through() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut g = garden(&mut rng);
        g.slots[3] = Slot {
            height: 100.0,
            char_level: 0.0,
            variant: Some(1),
            max_height: 300.0,
        };
        let result = g.interact(&particle(Element::Fire, 200.0, 500.0), &mut rng);
        assert_eq!(result, Interaction::PASS);
        assert_eq!(g.slots()[3].char_level, 0.0);

        let empty = g.interact(&particle(Element::Fire, 10.0, 719.0), &mut rng);
        assert_eq!(empty, Interaction::PASS);
    }

    #[test]
    fn charred_plant_burns_down_in_eight_pixel_steps() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut g = garden(&mut rng);
        g.slots[0] = Slot {
            height: 20.0,
            char_level: 1.0,
            variant: Some(2),
            max_height: 300.0,
        };
        let fire = particle(Element::Fire, 30.0, 719.0);

        assert_eq!(g.interact(&fire, &mut rng), Interaction::BURNED);
        assert_eq!(g.slots()[0].height, 12.0);
        assert_eq!(g.interact(&fire, &mut rng), Interaction::BURNED);
        assert_eq!(g.slots()[0].height, 4.0);
        assert_eq!(g.interact(&fire, &mut rng), Interaction::BURNED);

        let slot = &g.slots()[0];
        assert_eq!(slot.height, 0.0);
        assert_eq!(slot.variant, None);
        assert_eq!(slot.char_level, 0.0);
    }

    #[test]
    fn repeated_fire_reaches_full_char() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut g = garden(&mut rng);
        g.slots[0] = Slot {
            height: 50.0,
            char_level: 0.0,
            variant: Some(0),
            max_height: 300.0,
        };
        let fire = particle(Element::Fire, 5.0, 715.0);
        let mut burned = false;
        for _ in 0..25 {
            burned |= g.interact(&fire, &mut rng).spawn_ash;
        }
        assert!(burned);
        assert!(g.slots()[0].char_level <= 1.0);
        assert!(g.slots()[0].height < 50.0);
    }

    #[test]
    fn ash_and_out_of_range_particles_are_ignored() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut g = garden(&mut rng);
        let before = g.snapshot();
        assert_eq!(
            g.interact(&particle(Element::Ash, 10.0, 719.0), &mut rng),
            Interaction::PASS
        );
        assert_eq!(
            g.interact(&particle(Element::Water, -5.0, 719.0), &mut rng),
            Interaction::PASS
        );
        assert_eq!(
            g.interact(&particle(Element::Water, 5000.0, 719.0), &mut rng),
            Interaction::PASS
        );
        assert_eq!(
            g.interact(&particle(Element::Water, f32::NAN, 719.0), &mut rng),
            Interaction::PASS
        );
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut g = garden(&mut rng);
        for x in [10.0, 70.0, 70.0, 400.0] {
            g.interact(&particle(Element::Water, x, 719.0), &mut rng);
        }
        g.slots[1].char_level = 0.35;

        let snapshot = g.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: GardenSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
