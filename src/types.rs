use std::{fmt, time::Instant};

use serde::{Deserialize, Serialize};

pub const NUM_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;

/// Fingertips of index, middle, ring and pinky, in that order.
pub const FINGER_TIPS: [usize; 4] = [8, 12, 16, 20];
/// Proximal interphalangeal joints matching `FINGER_TIPS`.
pub const FINGER_PIPS: [usize; 4] = [6, 10, 14, 18];

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        let mut rgba = vec![0u8; (width as usize) * (height as usize) * 4];
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Point { x, y }
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

#[derive(Debug)]
pub struct LandmarkCountError(pub usize);

impl fmt::Display for LandmarkCountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {NUM_LANDMARKS} hand landmarks, got {}",
            self.0
        )
    }
}

/// The 21 keypoints of one detected hand, in MediaPipe order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct HandLandmarks([Point; NUM_LANDMARKS]);

impl HandLandmarks {
    pub fn new(points: [Point; NUM_LANDMARKS]) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point; NUM_LANDMARKS] {
        &self.0
    }

    pub fn wrist(&self) -> Point {
        self.0[WRIST]
    }

    pub fn thumb_tip(&self) -> Point {
        self.0[THUMB_TIP]
    }

    pub fn index_tip(&self) -> Point {
        self.0[INDEX_TIP]
    }

    pub fn middle_mcp(&self) -> Point {
        self.0[MIDDLE_MCP]
    }

    pub fn middle_tip(&self) -> Point {
        self.0[MIDDLE_TIP]
    }

    pub fn finger_tips(&self) -> [Point; 4] {
        FINGER_TIPS.map(|idx| self.0[idx])
    }

    pub fn finger_pips(&self) -> [Point; 4] {
        FINGER_PIPS.map(|idx| self.0[idx])
    }

    /// Projects normalized [0,1] coordinates into pixel space.
    pub fn to_pixels(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self(self.0.map(|p| Point::new(p.x * w, p.y * h)))
    }
}

impl TryFrom<Vec<Point>> for HandLandmarks {
    type Error = LandmarkCountError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        let len = points.len();
        let array: [Point; NUM_LANDMARKS] =
            points.try_into().map_err(|_| LandmarkCountError(len))?;
        Ok(Self(array))
    }
}

impl From<HandLandmarks> for Vec<Point> {
    fn from(hand: HandLandmarks) -> Self {
        hand.0.to_vec()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Handedness {
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
            Handedness::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerState {
    Extended,
    Folded,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    #[default]
    Neutral,
    Angry,
    Shy,
    Dancing,
    Happy,
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Neutral => "NEUTRAL",
            Gesture::Angry => "ANGRY",
            Gesture::Shy => "SHY",
            Gesture::Dancing => "DANCING",
            Gesture::Happy => "HAPPY",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Gesture::Neutral => "😐 ",
            Gesture::Angry => "😠 ",
            Gesture::Shy => "😳 ",
            Gesture::Dancing => "💃 ",
            Gesture::Happy => "😄 ",
        }
    }
}

#[derive(Clone, Debug)]
pub struct GestureDetail {
    pub primary: Gesture,
    pub finger_states: [FingerState; 4],
    /// Thumb-to-index distance divided by wrist-to-middle-knuckle distance.
    pub pinch_ratio: f32,
}

/// One detected hand as delivered by the landmark detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub handedness: Handedness,
    /// Normalized [0,1] image coordinates.
    pub landmarks: HandLandmarks,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub hands: Vec<Detection>,
    #[serde(skip)]
    pub background: Option<Frame>,
}

impl DetectionFrame {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            hands: Vec::new(),
            background: None,
        }
    }
}
