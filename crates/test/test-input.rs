//! Drive every input path against a live client so key routing and clicks can
//! be checked by eye before a hunt.
//!
//! Usage: test-input [libtest args]
//!   AUTOHUNT_STUB=1          use the simulated world instead of the native backend
//!   AUTOHUNT_PATTERN=regex   window title filter (default: settings.json pattern)
//!   AUTOHUNT_AT=x,y          click position in client coordinates (default: frame center)
//!   AUTOHUNT_SHOT=out.png    save the captured frame

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use image::{Rgba, RgbaImage};
use libtest_mimic::{Arguments, Failed, Trial};

use autohunt_core::keys::{Key, KeyClass, KeyRouting};
use autohunt_core::logger;
use autohunt_core::platform::{create_platform, FrameSource, InputSink, MouseButton, Platform};
use autohunt_core::settings::Settings;
use autohunt_core::types::{Frame, Point};

/// Pause between actions so the operator can follow along in the client.
const PAUSE: Duration = Duration::from_millis(300);

struct Session {
    platform: Box<dyn Platform>,
    source: Box<dyn FrameSource>,
    input: Box<dyn InputSink>,
    routing: KeyRouting,
    at: Option<Point>,
    shot: Option<PathBuf>,
}

type Shared = Arc<Mutex<Session>>;

fn parse_point(s: &str) -> Result<Point> {
    let (x, y) = s.split_once(',').ok_or_else(|| anyhow!("expected x,y, got {:?}", s))?;
    Ok(Point::new(x.trim().parse()?, y.trim().parse()?))
}

fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    let mut img = RgbaImage::new(frame.width(), frame.height());
    for (x, y, px) in img.enumerate_pixels_mut() {
        if let Some([b, g, r, _]) = frame.pixel(x, y) {
            *px = Rgba([r, g, b, 255]);
        }
    }
    img.save(path).with_context(|| format!("writing {}", path.display()))
}

fn open_session() -> Result<Session> {
    logger::init(Path::new("logs")).context("creating logs directory")?;
    let settings = Settings::load(Path::new("settings.json"))?;
    let stub = std::env::var("AUTOHUNT_STUB").is_ok_and(|v| v == "1");
    let pattern = std::env::var("AUTOHUNT_PATTERN").unwrap_or(settings.window_pattern);
    let at = std::env::var("AUTOHUNT_AT").ok().map(|s| parse_point(&s)).transpose()?;
    let shot = std::env::var("AUTOHUNT_SHOT").ok().map(PathBuf::from);

    let platform = create_platform(stub);
    let Some((id, title)) = platform.get_instances(&pattern).into_iter().next() else {
        bail!("no window matches {:?}", pattern);
    };
    println!("window {:#x} \"{}\"", id, title);
    platform.activate_window(id)?;

    let routing = KeyRouting::standard();
    let (source, input) = platform.attach(id, routing.clone(), settings.hunt.key_hold)?;
    Ok(Session { platform, source, input, routing, at, shot })
}

fn lock(session: &Shared) -> Result<std::sync::MutexGuard<'_, Session>> {
    session.lock().map_err(|_| anyhow!("session poisoned"))
}

fn capture(session: &Shared) -> Result<()> {
    let mut s = lock(session)?;
    let frame = s.source.capture()?;
    println!("captured {}x{}", frame.width(), frame.height());
    if s.at.is_none() {
        s.at = Some(Point::new(frame.width() as i32 / 2, frame.height() as i32 / 2));
    }
    if let Some(path) = &s.shot {
        save_frame(&frame, path)?;
        println!("saved {}", path.display());
    }
    Ok(())
}

fn click(session: &Shared, button: MouseButton) -> Result<()> {
    let mut s = lock(session)?;
    let at = s.at.unwrap_or(Point::new(400, 300));
    let before = s.platform.cursor_pos()?;
    s.input.click(at, button, true)?;
    let after = s.platform.cursor_pos()?;
    println!("{:?} click at ({}, {}), cursor {:?} -> {:?}", button, at.x, at.y, before, after);
    if before != after {
        bail!("cursor not restored: {:?} became {:?}", before, after);
    }
    thread::sleep(PAUSE);
    Ok(())
}

fn keys(session: &Shared, class: KeyClass, names: &[&str]) -> Result<()> {
    let mut s = lock(session)?;
    for name in names {
        let key: Key = name.parse()?;
        if key.class() != class {
            bail!("{} is {:?}, not {:?}", key, key.class(), class);
        }
        let channel = s.routing.route(key);
        s.input.send_key(key)?;
        println!("{} via {:?}", key, channel);
        thread::sleep(PAUSE);
    }
    Ok(())
}

fn trial(name: &'static str, session: &Shared, f: impl Fn(&Shared) -> Result<()> + Send + 'static) -> Trial {
    let session = Arc::clone(session);
    Trial::test(name, move || f(&session).map_err(|e| Failed::from(format!("{:#}", e))))
}

fn main() -> Result<()> {
    let mut args = Arguments::from_args();
    // One live client, one action at a time, in listed order.
    args.test_threads = Some(1);

    let session: Shared = Arc::new(Mutex::new(open_session()?));
    let tests = vec![
        trial("capture", &session, capture),
        trial("click_left", &session, |s| click(s, MouseButton::Left)),
        trial("click_right", &session, |s| click(s, MouseButton::Right)),
        trial("ability_keys", &session, |s| keys(s, KeyClass::Ability, &["F1", "F2", "F3", "F4"])),
        trial("item_keys", &session, |s| keys(s, KeyClass::Item, &["1", "2", "3", "4", "5", "6"])),
        trial("other_keys", &session, |s| keys(s, KeyClass::Other, &["M", "F"])),
    ];
    libtest_mimic::run(&args, tests).exit()
}
