//! Target continuity across frames.
//!
//! Entities carry no identity between detections. The engaged target is the
//! detection whose bbox origin sits within a per-axis tolerance of the origin
//! snapshotted at acquisition. That assumption lives behind [`TargetMatcher`] so
//! the engine does not depend on how "same target" is decided.

use crate::types::{DetectedEntity, Point};

pub trait TargetMatcher: Send {
    /// Whether `entity` is the target acquired at `anchor`.
    fn is_same_target(&self, anchor: Point, entity: &DetectedEntity) -> bool;

    /// Whether any of `entities` is the target acquired at `anchor`.
    fn still_present(&self, anchor: Point, entities: &[DetectedEntity]) -> bool {
        entities.iter().any(|e| self.is_same_target(anchor, e))
    }
}

/// Positional re-matching: `|x - ax| < tolerance && |y - ay| < tolerance`.
#[derive(Debug, Clone, Copy)]
pub struct AnchorMatcher {
    tolerance: i32,
}

impl AnchorMatcher {
    pub fn new(tolerance: i32) -> Self {
        Self { tolerance }
    }
}

impl TargetMatcher for AnchorMatcher {
    fn is_same_target(&self, anchor: Point, entity: &DetectedEntity) -> bool {
        let origin = entity.bbox().origin();
        (origin.x - anchor.x).abs() < self.tolerance && (origin.y - anchor.y).abs() < self.tolerance
    }
}
