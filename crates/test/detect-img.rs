//! Run the detector on a screenshot and write a visualization next to it.
//!
//! Usage: detect-img <screenshot.png> [--area] [--settings settings.json] [-o out.png]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{Rgba, RgbaImage};

use autohunt_core::config::{DetectionMode, DetectorConfig};
use autohunt_core::detect::EntityDetector;
use autohunt_core::settings::Settings;
use autohunt_core::types::{Frame, Point, Rect};

const REGION: Rgba<u8> = Rgba([255, 220, 0, 255]);
const BOX: Rgba<u8> = Rgba([0, 255, 0, 255]);
const CLICK: Rgba<u8> = Rgba([255, 0, 255, 255]);

fn load_frame(path: &Path) -> Result<(Frame, RgbaImage)> {
    let img = image::open(path).with_context(|| format!("opening {}", path.display()))?.to_rgba8();
    let (w, h) = img.dimensions();
    let mut data = Vec::with_capacity(w as usize * h as usize * 4);
    for px in img.pixels() {
        let [r, g, b, _] = px.0;
        data.extend_from_slice(&[b, g, r, 255]);
    }
    let frame = Frame::new(data, w, h, w * 4)?;
    Ok((frame, img))
}

fn put(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn outline(img: &mut RgbaImage, r: Rect, color: Rgba<u8>) {
    for x in r.x - 1..=r.right() {
        put(img, x, r.y - 1, color);
        put(img, x, r.bottom(), color);
    }
    for y in r.y - 1..=r.bottom() {
        put(img, r.x - 1, y, color);
        put(img, r.right(), y, color);
    }
}

fn cross(img: &mut RgbaImage, p: Point, color: Rgba<u8>) {
    for d in -4..=4 {
        put(img, p.x + d, p.y, color);
        put(img, p.x, p.y + d, color);
    }
}

fn main() -> Result<()> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut settings_path: Option<PathBuf> = None;
    let mut area_mode = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--area" => area_mode = true,
            "--settings" => settings_path = args.next().map(PathBuf::from),
            "-o" => output = args.next().map(PathBuf::from),
            _ if input.is_none() => input = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument {}", arg),
        }
    }
    let Some(input) = input else {
        bail!("usage: detect-img <screenshot.png> [--area] [--settings settings.json] [-o out.png]");
    };
    let output = output.unwrap_or_else(|| input.with_extension("detect.png"));

    let mut config: DetectorConfig = match &settings_path {
        Some(p) => Settings::load(p)?.hunt.detector,
        None => DetectorConfig::default(),
    };
    if area_mode {
        config.mode = DetectionMode::default_area();
    }

    let (frame, mut img) = load_frame(&input)?;
    let detector = EntityDetector::new(config);
    let entities = detector.detect_default(&frame)?;

    println!("{}x{} frame, {} entities", frame.width(), frame.height(), entities.len());
    for (i, e) in entities.iter().enumerate() {
        let b = e.bbox();
        let c = e.click_position();
        println!(
            "  #{:<3} bbox ({}, {}) {}x{}  area {}  click ({}, {})",
            i, b.x, b.y, b.w, b.h, e.area(), c.x, c.y
        );
    }

    outline(&mut img, detector.config().region, REGION);
    for e in &entities {
        outline(&mut img, e.bbox(), BOX);
        cross(&mut img, e.click_position(), CLICK);
    }
    img.save(&output).with_context(|| format!("writing {}", output.display()))?;
    println!("wrote {}", output.display());
    Ok(())
}
