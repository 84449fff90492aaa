use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keys::Key;
use crate::types::{Point, Rect};

/// Inclusive HSV box, OpenCV 8-bit scale: hue 0..=180, saturation and value 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let err = |reason: String| ConfigError::HueRange { index, reason };
        if self.lower[0] > 180 || self.upper[0] > 180 {
            return Err(err(format!("hue bounds {}..{} exceed 180", self.lower[0], self.upper[0])));
        }
        for c in 0..3 {
            if self.lower[c] > self.upper[c] {
                return Err(err(format!("channel {} lower {} > upper {}", c, self.lower[c], self.upper[c])));
            }
        }
        Ok(())
    }
}

/// Shape filter applied to connected components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DetectionMode {
    /// Keep blobs by pixel area; click the blob center.
    Area { min_area: u32, max_area: u32 },
    /// Keep thin horizontal indicator bars; click `click_offset` below the bar center.
    Bar {
        min_width: i32,
        max_width: i32,
        min_height: i32,
        max_height: i32,
        min_aspect: f32,
        click_offset: i32,
    },
}

impl DetectionMode {
    pub fn default_area() -> Self {
        DetectionMode::Area { min_area: 50, max_area: 15000 }
    }

    pub fn default_bar() -> Self {
        DetectionMode::Bar {
            min_width: 15,
            max_width: 120,
            min_height: 2,
            max_height: 8,
            min_aspect: 3.0,
            click_offset: 40,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            DetectionMode::Area { min_area, max_area } => {
                if max_area == 0 || min_area > max_area {
                    return Err(ConfigError::ModeBounds(format!("area {}..{}", min_area, max_area)));
                }
            }
            DetectionMode::Bar { min_width, max_width, min_height, max_height, min_aspect, .. } => {
                if min_width <= 0 || min_width > max_width {
                    return Err(ConfigError::ModeBounds(format!("width {}..{}", min_width, max_width)));
                }
                if min_height <= 0 || min_height > max_height {
                    return Err(ConfigError::ModeBounds(format!("height {}..{}", min_height, max_height)));
                }
                if !min_aspect.is_finite() || min_aspect < 0.0 {
                    return Err(ConfigError::ModeBounds(format!("aspect {}", min_aspect)));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Two ranges so red can span both ends of the hue circle.
    pub hue_ranges: [HsvRange; 2],
    pub mode: DetectionMode,
    /// Half-width of the square dilation kernel used to merge fragments.
    pub dilate_radius: u32,
    pub region: Rect,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hue_ranges: [
                HsvRange::new([0, 50, 50], [10, 255, 255]),
                HsvRange::new([160, 50, 50], [180, 255, 255]),
            ],
            mode: DetectionMode::default_bar(),
            dilate_radius: 1,
            region: Rect::new(50, 50, 750, 500),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, range) in self.hue_ranges.iter().enumerate() {
            range.validate(i)?;
        }
        self.mode.validate()?;
        if self.region.is_empty() {
            return Err(ConfigError::EmptyRegion);
        }
        Ok(())
    }
}

/// Every tuned parameter of a hunt. Loaded once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    pub detector: DetectorConfig,
    /// Abilities cast round-robin, one per engagement action.
    pub abilities: Vec<Key>,
    pub loot_key: Key,
    #[serde(with = "secs")]
    pub attack_interval: Duration,
    #[serde(with = "secs")]
    pub skill_interval: Duration,
    #[serde(with = "secs")]
    pub max_attack_wait: Duration,
    #[serde(with = "secs")]
    pub check_interval: Duration,
    #[serde(with = "secs")]
    pub loot_delay: Duration,
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    #[serde(with = "secs")]
    pub rest_after_engagement: Duration,
    #[serde(with = "secs")]
    pub click_settle: Duration,
    #[serde(with = "secs")]
    pub loot_settle: Duration,
    #[serde(with = "secs")]
    pub key_hold: Duration,
    /// Max per-axis distance (exclusive) for a detection to count as the engaged target.
    pub anchor_tolerance: i32,
    /// Reference point for target selection; the region center when unset.
    pub player_position: Option<Point>,
    /// Keep casting abilities every `attack_interval` while awaiting a kill.
    pub follow_up_attacks: bool,
    /// Random +/- fraction applied to real-time waits.
    pub jitter: f64,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            abilities: vec![Key(0x70), Key(0x71), Key(0x72), Key(0x73)],
            loot_key: Key(0x46),
            attack_interval: Duration::from_millis(800),
            skill_interval: Duration::from_millis(300),
            max_attack_wait: Duration::from_secs(15),
            check_interval: Duration::from_millis(1500),
            loot_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(2),
            rest_after_engagement: Duration::from_secs(1),
            click_settle: Duration::from_millis(200),
            loot_settle: Duration::from_millis(500),
            key_hold: Duration::from_millis(50),
            anchor_tolerance: 20,
            player_position: None,
            follow_up_attacks: false,
            jitter: 0.1,
        }
    }
}

impl HuntConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        if self.abilities.is_empty() {
            return Err(ConfigError::NoAbilities);
        }
        let positive = [
            ("check_interval", self.check_interval),
            ("max_attack_wait", self.max_attack_wait),
            ("poll_interval", self.poll_interval),
            ("attack_interval", self.attack_interval),
        ];
        for (name, d) in positive {
            if d.is_zero() {
                return Err(ConfigError::NonPositive { name });
            }
        }
        if self.anchor_tolerance <= 0 {
            return Err(ConfigError::NonPositive { name: "anchor_tolerance" });
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(ConfigError::Jitter(self.jitter));
        }
        Ok(())
    }

    pub fn player_anchor(&self) -> Point {
        self.player_position.unwrap_or_else(|| self.detector.region.center())
    }
}

/// Durations as fractional seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
