use crate::types::{FingerState, Gesture, GestureDetail, HandLandmarks};

/// Pinch distance below this fraction of the hand size reads as `Shy`.
const PINCH_RATIO: f32 = 0.20;
const HAPPY_MIN_FINGERS: usize = 3;
const OPEN_HAND_MIN_FINGERS: usize = 3;
const MIN_HAND_SIZE: f32 = 1e-6;

/// Extended/folded status for index, middle, ring and pinky.
///
/// A finger counts as extended when its tip lies farther from the wrist than
/// its proximal joint. Squared distances are compared, so the test is
/// independent of hand rotation and of the coordinate scale.
pub fn finger_states(hand: &HandLandmarks) -> [FingerState; 4] {
    let wrist = hand.wrist();
    let tips = hand.finger_tips();
    let pips = hand.finger_pips();

    std::array::from_fn(|i| {
        if tips[i].distance_squared(wrist) > pips[i].distance_squared(wrist) {
            FingerState::Extended
        } else {
            FingerState::Folded
        }
    })
}

fn extended_count(states: &[FingerState; 4]) -> usize {
    states
        .iter()
        .filter(|s| **s == FingerState::Extended)
        .count()
}

/// Thumb-to-index pinch distance normalized by wrist-to-middle-knuckle span.
/// Degenerate hands (zero span) report an infinite ratio so they never pinch.
pub fn pinch_ratio(hand: &HandLandmarks) -> f32 {
    let hand_size = hand.wrist().distance(hand.middle_mcp());
    if hand_size <= MIN_HAND_SIZE {
        return f32::INFINITY;
    }
    hand.thumb_tip().distance(hand.index_tip()) / hand_size
}

pub fn analyze(hand: &HandLandmarks) -> GestureDetail {
    let finger_states = finger_states(hand);
    let pinch_ratio = pinch_ratio(hand);
    let count = extended_count(&finger_states);

    // First match wins.
    let primary = if count == 0 {
        Gesture::Angry
    } else if pinch_ratio < PINCH_RATIO {
        Gesture::Shy
    } else if count == 1 && finger_states[0] == FingerState::Extended {
        Gesture::Dancing
    } else if count >= HAPPY_MIN_FINGERS {
        Gesture::Happy
    } else {
        Gesture::Neutral
    };

    GestureDetail {
        primary,
        finger_states,
        pinch_ratio,
    }
}

pub fn classify(hand: &HandLandmarks) -> Gesture {
    analyze(hand).primary
}

/// Open palm test used to trigger particle emission.
pub fn is_hand_open(hand: &HandLandmarks) -> bool {
    extended_count(&finger_states(hand)) >= OPEN_HAND_MIN_FINGERS
}


#[cfg(test)]
mod tests {
    use super::fixtures::hand;
    use super::*;
    use crate::types::{HandLandmarks, NUM_LANDMARKS, Point};

    #[test]
    fn fist_is_angry_even_when_pinching() {
        assert_eq!(classify(&hand([false; 4], false)), Gesture::Angry);
        assert_eq!(classify(&hand([false; 4], true)), Gesture::Angry);
    }

    #[test]
    fn pinch_takes_priority_over_happy() {
        assert_eq!(classify(&hand([true; 4], true)), Gesture::Shy);
        assert_eq!(classify(&hand([true, true, false, false], true)), Gesture::Shy);
    }

    #[test]
    fn lone_index_finger_is_dancing() {
        assert_eq!(
            classify(&hand([true, false, false, false], false)),
            Gesture::Dancing
        );
    }

    #[test]
    fn three_or_more_fingers_is_happy() {
        assert_eq!(classify(&hand([true, true, true, false], false)), Gesture::Happy);
        assert_eq!(classify(&hand([false, true, true, true], false)), Gesture::Happy);
        assert_eq!(classify(&hand([true; 4], false)), Gesture::Happy);
    }

    #[test]
    fn remaining_patterns_are_neutral() {
        assert_eq!(
            classify(&hand([true, true, false, false], false)),
            Gesture::Neutral
        );
        assert_eq!(
            classify(&hand([false, true, false, false], false)),
            Gesture::Neutral
        );
    }

    #[test]
    fn classification_is_scale_invariant() {
        let normalized = hand([true, false, false, false], false);
        let pixels = normalized.to_pixels(1280, 1280);
        assert_eq!(classify(&normalized), classify(&pixels));
    }

    #[test]
    fn open_hand_needs_three_fingers() {
        assert!(is_hand_open(&hand([true, true, true, false], false)));
        assert!(is_hand_open(&hand([true; 4], true)));
        assert!(!is_hand_open(&hand([true, true, false, false], false)));
        assert!(!is_hand_open(&hand([false; 4], false)));
    }

    #[test]
    fn degenerate_hand_never_pinches() {
        let collapsed = HandLandmarks::new([Point::new(0.3, 0.3); NUM_LANDMARKS]);
        assert!(pinch_ratio(&collapsed).is_infinite());
        assert_eq!(classify(&collapsed), Gesture::Angry);
    }

    #[test]
    fn detail_reports_finger_states() {
        let detail = analyze(&hand([true, false, true, false], false));
        assert_eq!(
            detail.finger_states,
            [
                FingerState::Extended,
                FingerState::Folded,
                FingerState::Extended,
                FingerState::Folded
            ]
        );
        assert!(detail.pinch_ratio > PINCH_RATIO);
    }
}
