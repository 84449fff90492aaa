//! Color segmentation of health-indicator fragments into candidate entities.
//!
//! Pipeline: crop to region, HSV convert, two-range red mask, square dilation to
//! merge fragments, 8-connected components on the dilated mask, shape filter.
//! Each component's box and area come from the undilated mask pixels it covers,
//! so dilation only decides grouping and never inflates a box past the region.

use std::collections::VecDeque;

use crate::config::{DetectionMode, DetectorConfig};
use crate::error::FrameError;
use crate::types::{ClickRule, DetectedEntity, Frame, Rect};

/// Convert one BGR pixel to OpenCV-style 8-bit HSV (hue 0..180).
pub fn bgr_to_hsv(b: u8, g: u8, r: u8) -> [u8; 3] {
    let (bf, gf, rf) = (b as f32, g as f32, r as f32);
    let max = bf.max(gf).max(rf);
    let min = bf.min(gf).min(rf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [(h / 2.0).round().min(180.0) as u8, s.round() as u8, v as u8]
}

/// Binary image, one byte per pixel.
struct Mask {
    w: usize,
    h: usize,
    bits: Vec<bool>,
}

impl Mask {
    fn get(&self, x: usize, y: usize) -> bool {
        self.bits[y * self.w + x]
    }

    /// Square max filter of half-width `r`, done as two separable passes.
    fn dilate(&self, r: usize) -> Mask {
        if r == 0 {
            return Mask { w: self.w, h: self.h, bits: self.bits.clone() };
        }
        let (w, h) = (self.w, self.h);
        let mut horiz = vec![false; w * h];
        for y in 0..h {
            let row = &self.bits[y * w..(y + 1) * w];
            for x in 0..w {
                let lo = x.saturating_sub(r);
                let hi = (x + r).min(w - 1);
                horiz[y * w + x] = row[lo..=hi].iter().any(|&b| b);
            }
        }
        let mut out = vec![false; w * h];
        for y in 0..h {
            let lo = y.saturating_sub(r);
            let hi = (y + r).min(h - 1);
            for x in 0..w {
                out[y * w + x] = (lo..=hi).any(|yy| horiz[yy * w + x]);
            }
        }
        Mask { w, h, bits: out }
    }
}

/// A component measured on the undilated mask, in region-local coordinates.
#[derive(Debug, Clone, Copy)]
struct Component {
    bbox: Rect,
    area: u32,
}

pub struct EntityDetector {
    config: DetectorConfig,
}

impl EntityDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect entities inside `region` (clamped to the frame). Results are in
    /// full-frame coordinates, ordered by each component's first pixel in raster
    /// order. An empty result is the normal "nothing here" answer.
    pub fn detect(&self, frame: &Frame, region: Rect) -> Result<Vec<DetectedEntity>, FrameError> {
        if frame.is_empty() {
            return Err(FrameError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                frame.width(),
                frame.height()
            )));
        }
        let Some(crop) = frame.bounds().intersect(&region) else {
            return Ok(Vec::new());
        };

        let mask = self.color_mask(frame, crop);
        let merged = mask.dilate(self.config.dilate_radius as usize);
        let components = components(&mask, &merged);

        let rule = match self.config.mode {
            DetectionMode::Area { .. } => ClickRule::Center,
            DetectionMode::Bar { click_offset, .. } => ClickRule::BelowCenter(click_offset),
        };

        Ok(components
            .into_iter()
            .filter(|c| self.keep(c))
            .map(|c| {
                let bbox = Rect::new(c.bbox.x + crop.x, c.bbox.y + crop.y, c.bbox.w, c.bbox.h);
                DetectedEntity::new(bbox, c.area, rule)
            })
            .collect())
    }

    /// Detect in the configured region.
    pub fn detect_default(&self, frame: &Frame) -> Result<Vec<DetectedEntity>, FrameError> {
        self.detect(frame, self.config.region)
    }

    fn color_mask(&self, frame: &Frame, crop: Rect) -> Mask {
        let (w, h) = (crop.w as usize, crop.h as usize);
        let mut bits = vec![false; w * h];
        for y in 0..h {
            for x in 0..w {
                let Some([b, g, r, _]) = frame.pixel((crop.x as usize + x) as u32, (crop.y as usize + y) as u32)
                else {
                    continue;
                };
                let hsv = bgr_to_hsv(b, g, r);
                bits[y * w + x] = self.config.hue_ranges.iter().any(|range| range.contains(hsv));
            }
        }
        Mask { w, h, bits }
    }

    fn keep(&self, c: &Component) -> bool {
        match self.config.mode {
            DetectionMode::Area { min_area, max_area } => c.area >= min_area && c.area <= max_area,
            DetectionMode::Bar { min_width, max_width, min_height, max_height, min_aspect, .. } => {
                let (w, h) = (c.bbox.w, c.bbox.h);
                w >= min_width
                    && w <= max_width
                    && h >= min_height
                    && h <= max_height
                    && (w as f32 / h as f32) > min_aspect
            }
        }
    }
}

/// Label 8-connected components of `merged`, measuring each on `raw`.
/// Components whose merged blob covers no raw pixel cannot occur since
/// dilation only grows from raw pixels.
fn components(raw: &Mask, merged: &Mask) -> Vec<Component> {
    let (w, h) = (merged.w, merged.h);
    let mut seen = vec![false; w * h];
    let mut out = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if !merged.bits[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (usize::MAX, usize::MAX, 0, 0);
        let mut area = 0u32;

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            if raw.get(x, y) {
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if merged.bits[n] && !seen[n] {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        if area > 0 {
            out.push(Component {
                bbox: Rect::new(
                    min_x as i32,
                    min_y as i32,
                    (max_x - min_x + 1) as i32,
                    (max_y - min_y + 1) as i32,
                ),
                area,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HsvRange;

    const RED: [u8; 4] = [0, 0, 220, 255];
    const DARK_RED: [u8; 4] = [30, 10, 200, 255]; // hue wraps to ~174
    const GRASS: [u8; 4] = [40, 140, 60, 255];

    fn bar_config() -> DetectorConfig {
        DetectorConfig {
            mode: DetectionMode::Bar {
                min_width: 10,
                max_width: 60,
                min_height: 2,
                max_height: 6,
                min_aspect: 3.0,
                click_offset: 30,
            },
            dilate_radius: 1,
            region: Rect::new(50, 50, 400, 300),
            ..DetectorConfig::default()
        }
    }

    fn area_config() -> DetectorConfig {
        DetectorConfig {
            mode: DetectionMode::Area { min_area: 20, max_area: 400 },
            dilate_radius: 2,
            region: Rect::new(0, 0, 300, 200),
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn hsv_matches_opencv_scale() {
        assert_eq!(bgr_to_hsv(0, 0, 255), [0, 255, 255]);
        assert_eq!(bgr_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(bgr_to_hsv(255, 0, 0), [120, 255, 255]);
        assert_eq!(bgr_to_hsv(40, 40, 40), [0, 0, 40]);
        let [h, _, _] = bgr_to_hsv(DARK_RED[0], DARK_RED[1], DARK_RED[2]);
        assert!(h >= 160, "hue {}", h);
    }

    #[test]
    fn single_bar_exact_bbox_and_offset_click() {
        let frame = Frame::solid(640, 480, GRASS).with_rect(Rect::new(120, 80, 20, 3), RED);
        let det = EntityDetector::new(bar_config());
        let found = det.detect_default(&frame).unwrap();
        assert_eq!(found.len(), 1);
        let e = found[0];
        assert_eq!(e.bbox(), Rect::new(120, 80, 20, 3));
        assert_eq!(e.area(), 60);
        assert_eq!(e.click_position().x, 130);
        assert_eq!(e.click_position().y, 81 + 30);
    }

    #[test]
    fn both_hue_ranges_contribute() {
        let frame = Frame::solid(640, 480, GRASS)
            .with_rect(Rect::new(100, 100, 30, 4), RED)
            .with_rect(Rect::new(300, 200, 30, 4), DARK_RED);
        let det = EntityDetector::new(bar_config());
        assert_eq!(det.detect_default(&frame).unwrap().len(), 2);

        let mut only_low = bar_config();
        only_low.hue_ranges[1] = HsvRange::new([0, 255, 255], [0, 255, 255]);
        let det = EntityDetector::new(only_low);
        assert_eq!(det.detect_default(&frame).unwrap().len(), 1);
    }

    #[test]
    fn dilation_merges_fragments_without_inflating_bbox() {
        // Two halves of one bar separated by a one-pixel anti-aliasing gap.
        let frame = Frame::solid(640, 480, GRASS)
            .with_rect(Rect::new(200, 150, 12, 3), RED)
            .with_rect(Rect::new(213, 150, 12, 3), RED);
        let det = EntityDetector::new(bar_config());
        let found = det.detect_default(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox(), Rect::new(200, 150, 25, 3));
        assert_eq!(found[0].area(), 72);
    }

    #[test]
    fn bar_mode_rejects_bulky_and_tall_shapes() {
        let frame = Frame::solid(640, 480, GRASS)
            .with_rect(Rect::new(100, 100, 30, 30), RED) // square blob
            .with_rect(Rect::new(200, 100, 12, 5), RED) // aspect 2.4
            .with_rect(Rect::new(300, 100, 40, 4), RED); // keeper
        let det = EntityDetector::new(bar_config());
        let found = det.detect_default(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox(), Rect::new(300, 100, 40, 4));
    }

    #[test]
    fn mode_filter_invariants_hold() {
        let mut frame = Frame::solid(640, 480, GRASS);
        for i in 0..12 {
            let w = 6 + i * 5;
            let h = 1 + i % 7;
            frame = frame.with_rect(Rect::new(60 + (i % 4) * 100, 60 + (i / 4) * 80, w, h), RED);
        }
        let bar = bar_config();
        let DetectionMode::Bar { min_width, max_width, min_height, max_height, min_aspect, .. } = bar.mode
        else {
            unreachable!()
        };
        for e in EntityDetector::new(bar.clone()).detect_default(&frame).unwrap() {
            let b = e.bbox();
            assert!(b.w >= min_width && b.w <= max_width);
            assert!(b.h >= min_height && b.h <= max_height);
            assert!(b.w as f32 / b.h as f32 > min_aspect);
        }

        let mut area = area_config();
        area.region = Rect::new(0, 0, 640, 480);
        for e in EntityDetector::new(area).detect_default(&frame).unwrap() {
            assert!(e.area() >= 20 && e.area() <= 400);
        }
    }

    #[test]
    fn area_mode_clicks_center() {
        let frame = Frame::solid(300, 200, GRASS).with_rect(Rect::new(40, 40, 10, 8), RED);
        let found = EntityDetector::new(area_config()).detect_default(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].area(), 80);
        assert_eq!(found[0].click_position(), found[0].bbox().center());
    }

    #[test]
    fn entities_stay_inside_region() {
        // Bar straddles the region's left edge; only the inside part is seen.
        let frame = Frame::solid(640, 480, GRASS).with_rect(Rect::new(30, 100, 60, 3), RED);
        let region = Rect::new(50, 50, 400, 300);
        let found = EntityDetector::new(bar_config()).detect(&frame, region).unwrap();
        assert_eq!(found.len(), 1);
        assert!(region.contains_rect(&found[0].bbox()));
        assert_eq!(found[0].bbox(), Rect::new(50, 100, 40, 3));
    }

    #[test]
    fn detection_is_deterministic() {
        let frame = Frame::solid(640, 480, GRASS)
            .with_rect(Rect::new(300, 90, 30, 3), RED)
            .with_rect(Rect::new(100, 200, 25, 3), RED)
            .with_rect(Rect::new(120, 90, 20, 3), DARK_RED);
        let det = EntityDetector::new(bar_config());
        let first = det.detect_default(&frame).unwrap();
        assert_eq!(first.len(), 3);
        // Raster order of first pixel.
        assert_eq!(first[0].bbox().origin().x, 120);
        assert_eq!(first[1].bbox().origin().x, 300);
        for _ in 0..5 {
            assert_eq!(det.detect_default(&frame).unwrap(), first);
        }
    }

    #[test]
    fn empty_frame_and_region_edges() {
        let det = EntityDetector::new(bar_config());
        let plain = Frame::solid(640, 480, GRASS);
        assert!(det.detect_default(&plain).unwrap().is_empty());

        let outside = Rect::new(1000, 1000, 50, 50);
        assert!(det.detect(&plain, outside).unwrap().is_empty());

        let zero = Frame::solid(0, 0, GRASS);
        assert!(matches!(det.detect_default(&zero), Err(FrameError::InvalidFrame(_))));
    }
}
