use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Window identifier (HWND on Windows, synthetic id in the stub)
pub type WindowId = u64;

/// One pixel in BGRA byte order.
pub type Bgra = [u8; 4];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance; exact, so ties compare equal.
    pub fn distance_sq(self, other: Point) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

/// Axis-aligned rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Integer center, rounding toward the origin.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        if r > x && b > y {
            Some(Rect::new(x, y, r - x, b - y))
        } else {
            None
        }
    }
}

/// Immutable BGRA pixel snapshot of the target window's client area.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    bytes_per_row: u32,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a raw BGRA buffer. The buffer must hold `height` rows of `bytes_per_row`
    /// bytes, each row at least `width * 4` bytes long. Zero-sized frames are accepted
    /// here and rejected by the consumers that need pixels.
    pub fn new(data: Vec<u8>, width: u32, height: u32, bytes_per_row: u32) -> Result<Self, FrameError> {
        if (bytes_per_row as u64) < width as u64 * 4 {
            return Err(FrameError::InvalidFrame(format!(
                "row stride {} shorter than {} pixels",
                bytes_per_row, width
            )));
        }
        let needed = bytes_per_row as u64 * height as u64;
        if (data.len() as u64) < needed {
            return Err(FrameError::InvalidFrame(format!(
                "buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                needed
            )));
        }
        Ok(Self { data, width, height, bytes_per_row, captured_at: Instant::now() })
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, color: Bgra) -> Self {
        let data = color.repeat(width as usize * height as usize);
        Self { data, width, height, bytes_per_row: width * 4, captured_at: Instant::now() }
    }

    /// Paint `rect` (clipped to the frame) with `color`. Used while building a frame,
    /// before it is handed to a consumer.
    pub fn with_rect(mut self, rect: Rect, color: Bgra) -> Self {
        let bounds = Rect::new(0, 0, self.width as i32, self.height as i32);
        if let Some(r) = bounds.intersect(&rect) {
            for y in r.y..r.bottom() {
                for x in r.x..r.right() {
                    let idx = self.offset(x as u32, y as u32);
                    self.data[idx..idx + 4].copy_from_slice(&color);
                }
            }
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.bytes_per_row
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y * self.bytes_per_row + x * 4) as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Bgra> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.offset(x, y);
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Brightest color channel anywhere in the frame (alpha ignored).
    pub fn max_brightness(&self) -> u8 {
        let mut max = 0u8;
        for y in 0..self.height {
            let row = self.offset(0, y);
            for px in self.data[row..row + self.width as usize * 4].chunks_exact(4) {
                max = max.max(px[0]).max(px[1]).max(px[2]);
            }
            if max == u8::MAX {
                break;
            }
        }
        max
    }

    /// Save as PNG for offline inspection.
    #[cfg(feature = "debug-capture")]
    pub fn save_png(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let mut img = image::RgbaImage::new(self.width, self.height);
        for (x, y, px) in img.enumerate_pixels_mut() {
            if let Some([b, g, r, _]) = self.pixel(x, y) {
                *px = image::Rgba([r, g, b, 255]);
            }
        }
        img.save(path)?;
        Ok(())
    }
}

/// How a click position is derived from a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickRule {
    /// Center of the box.
    Center,
    /// `offset` pixels below the center of the box.
    BelowCenter(i32),
}

impl ClickRule {
    pub fn apply(self, bbox: &Rect) -> Point {
        let c = bbox.center();
        match self {
            ClickRule::Center => c,
            ClickRule::BelowCenter(offset) => Point::new(c.x, c.y + offset),
        }
    }
}

/// A candidate target found in one frame. Carries no identity across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEntity {
    bbox: Rect,
    click_position: Point,
    area: u32,
}

impl DetectedEntity {
    pub fn new(bbox: Rect, area: u32, rule: ClickRule) -> Self {
        Self { bbox, click_position: rule.apply(&bbox), area }
    }

    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    pub fn click_position(&self) -> Point {
        self.click_position
    }

    pub fn area(&self) -> u32 {
        self.area
    }
}

/// Observable phase of the engagement state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Searching,
    Acquired,
    Attacking,
    AwaitingDeathConfirmation,
    Looted,
    Abandoned,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Searching => "searching",
            Phase::Acquired => "acquired",
            Phase::Attacking => "attacking",
            Phase::AwaitingDeathConfirmation => "awaiting death",
            Phase::Looted => "looted",
            Phase::Abandoned => "abandoned",
        }
    }

    /// Phases where a stop request may be honored. Anywhere else the current
    /// engagement is mid-iteration and must reach one of these first.
    pub fn is_poll_point(self) -> bool {
        matches!(self, Phase::Searching | Phase::AwaitingDeathConfirmation)
    }
}

/// Running totals for one hunt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuntStats {
    pub kills: u32,
    pub abandoned: u32,
    pub engagements: u32,
    pub capture_failures: u32,
    pub checks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

/// One attachable target window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub id: WindowId,
    pub title: String,
}

/// State shared between the engine thread and the control panel.
#[derive(Debug)]
pub struct HuntStatus {
    pub windows: Vec<WindowEntry>,
    pub selected: Option<usize>,
    pub run_state: RunState,
    pub phase: Phase,
    pub target: Option<Point>,
    pub stats: HuntStats,
    pub error: Option<String>,
}

impl HuntStatus {
    pub fn new(windows: Vec<WindowEntry>) -> Self {
        Self {
            windows,
            selected: None,
            run_state: RunState::Stopped,
            phase: Phase::Searching,
            target: None,
            stats: HuntStats::default(),
            error: None,
        }
    }

    pub fn selected_window(&self) -> Option<&WindowEntry> {
        self.selected.and_then(|i| self.windows.get(i))
    }
}

/// Command from the control panel to the engine thread
pub enum Command {
    Select(usize),
    StartStop,
    Rescan,
    Quit,
}
