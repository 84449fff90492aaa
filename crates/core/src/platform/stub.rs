//! Simulated game window. Monsters are red health bars over a body; a left
//! click selects the nearest monster, ability keys damage the selection, and dead
//! monsters disappear and respawn elsewhere. Lets the whole hunt run anywhere.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::RegexBuilder;

use crate::error::{CaptureError, InputError};
use crate::keys::{Channel, Key, KeyClass, KeyRouting};
use crate::logger;
use crate::types::*;

use super::{FrameSource, InputSink, MouseButton, Platform};

const GRASS: Bgra = [40, 140, 60, 255];
const BAR: Bgra = [0, 0, 220, 255];
const BODY: Bgra = [120, 90, 70, 255];

/// Vertical distance from a bar's top edge to the middle of its body.
pub const BODY_OFFSET: i32 = 40;
const BODY_HEIGHT: i32 = 60;
const SELECT_RADIUS: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Click { pos: Point, button: MouseButton },
    Key { key: Key, channel: Channel },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monster {
    pub id: u32,
    pub bar: Rect,
    pub hp: u32,
}

pub struct StubWorld {
    width: u32,
    height: u32,
    spawn_area: Rect,
    population: usize,
    monster_hp: u32,
    monsters: Vec<Monster>,
    next_id: u32,
    selected: Option<u32>,
    rng: StdRng,
    events: Vec<InputEvent>,
    kills: u32,
    loots: u32,
    failing_captures: u32,
    closed: bool,
    minimized: bool,
    cursor: Point,
}

impl StubWorld {
    /// An empty world; monsters appear only through `spawn` unless a population is set.
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            spawn_area: Rect::new(60, 60, width as i32 - 160, height as i32 - 200),
            population: 0,
            monster_hp: 3,
            monsters: Vec::new(),
            next_id: 1,
            selected: None,
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
            kills: 0,
            loots: 0,
            failing_captures: 0,
            closed: false,
            minimized: false,
            cursor: Point::new(0, 0),
        }
    }

    /// Keep `population` monsters with `hp` hits each alive inside `area`.
    pub fn with_population(mut self, population: usize, hp: u32, area: Rect) -> Self {
        self.population = population;
        self.monster_hp = hp;
        self.spawn_area = area;
        self
    }

    pub fn shared(self) -> Arc<Mutex<StubWorld>> {
        Arc::new(Mutex::new(self))
    }

    pub fn spawn(&mut self, bar: Rect, hp: u32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.monsters.push(Monster { id, bar, hp });
        id
    }

    pub fn monsters(&self) -> &[Monster] {
        &self.monsters
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn loots(&self) -> u32 {
        self.loots
    }

    /// Make the next `n` captures fail with a backend error.
    pub fn fail_captures(&mut self, n: u32) {
        self.failing_captures = n;
    }

    /// Simulate the game window going away.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Iconify the window; captures fail until it is activated again.
    pub fn minimize(&mut self) {
        self.minimized = true;
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Where the last click without cursor restore left the cursor.
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    fn respawn(&mut self) {
        let mut attempts = 0;
        while self.monsters.len() < self.population && attempts < 50 {
            attempts += 1;
            let w = self.rng.gen_range(24..48);
            let x = self.rng.gen_range(self.spawn_area.x..self.spawn_area.right() - w);
            let y = self.rng.gen_range(self.spawn_area.y..self.spawn_area.bottom() - BODY_HEIGHT);
            let bar = Rect::new(x, y, w, 4);
            let clear = self.monsters.iter().all(|m| {
                (m.bar.x - bar.x).abs() > 80 || (m.bar.y - bar.y).abs() > BODY_HEIGHT + 20
            });
            if clear {
                let hp = self.monster_hp;
                let id = self.spawn(bar, hp);
                logger::info_p("stub", &format!("monster #{} spawned at ({}, {})", id, x, y));
            }
        }
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::solid(self.width, self.height, GRASS);
        for m in &self.monsters {
            let body = Rect::new(m.bar.x, m.bar.y + 10, m.bar.w, BODY_HEIGHT);
            frame = frame.with_rect(body, BODY).with_rect(m.bar, BAR);
        }
        frame
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        if self.closed {
            return Err(CaptureError::WindowInvalid);
        }
        if self.minimized {
            return Err(CaptureError::Minimized);
        }
        if self.failing_captures > 0 {
            self.failing_captures -= 1;
            return Err(CaptureError::Backend("simulated capture failure".into()));
        }
        self.respawn();
        Ok(self.render())
    }

    fn click(&mut self, pos: Point, button: MouseButton, restore_cursor: bool) -> Result<(), InputError> {
        if self.closed {
            return Err(InputError::WindowInvalid);
        }
        self.events.push(InputEvent::Click { pos, button });
        if !restore_cursor {
            self.cursor = pos;
        }
        if button == MouseButton::Right {
            return Ok(());
        }
        self.selected = self
            .monsters
            .iter()
            .map(|m| (Point::new(m.bar.center().x, m.bar.y + BODY_OFFSET).distance_sq(pos), m.id))
            .filter(|(d, _)| *d <= (SELECT_RADIUS * SELECT_RADIUS) as i64)
            .min()
            .map(|(_, id)| id);
        Ok(())
    }

    fn key(&mut self, key: Key, channel: Channel) -> Result<(), InputError> {
        if self.closed {
            return Err(InputError::WindowInvalid);
        }
        self.events.push(InputEvent::Key { key, channel });
        if key.class() == KeyClass::Ability {
            let Some(id) = self.selected else { return Ok(()) };
            if let Some(i) = self.monsters.iter().position(|m| m.id == id) {
                let m = &mut self.monsters[i];
                m.hp = m.hp.saturating_sub(1);
                if m.hp == 0 {
                    logger::info_p("stub", &format!("monster #{} died", id));
                    self.monsters.remove(i);
                    self.selected = None;
                    self.kills += 1;
                }
            }
        } else if channel == Channel::TopLevelSync {
            self.loots += 1;
        }
        Ok(())
    }
}

fn lock(world: &Mutex<StubWorld>) -> Option<MutexGuard<'_, StubWorld>> {
    world.lock().ok()
}

pub struct StubSource {
    world: Arc<Mutex<StubWorld>>,
}

impl StubSource {
    pub fn new(world: Arc<Mutex<StubWorld>>) -> Self {
        Self { world }
    }
}

impl FrameSource for StubSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        match lock(&self.world) {
            Some(mut w) => w.capture(),
            None => Err(CaptureError::Backend("world lock poisoned".into())),
        }
    }
}

pub struct StubSink {
    world: Arc<Mutex<StubWorld>>,
    routing: KeyRouting,
}

impl StubSink {
    pub fn new(world: Arc<Mutex<StubWorld>>, routing: KeyRouting) -> Self {
        Self { world, routing }
    }
}

impl InputSink for StubSink {
    fn click(&mut self, pos: Point, button: MouseButton, restore_cursor: bool) -> Result<(), InputError> {
        match lock(&self.world) {
            Some(mut w) => w.click(pos, button, restore_cursor),
            None => Err(InputError::Delivery("world lock poisoned".into())),
        }
    }

    fn send_key(&mut self, key: Key) -> Result<(), InputError> {
        let channel = self.routing.route(key);
        match lock(&self.world) {
            Some(mut w) => w.key(key, channel),
            None => Err(InputError::Delivery("world lock poisoned".into())),
        }
    }
}

pub struct StubPlatform {
    world: Arc<Mutex<StubWorld>>,
    windows: Vec<(WindowId, String)>,
}

impl StubPlatform {
    pub fn new() -> Self {
        let area = Rect::new(80, 80, 640, 420);
        Self::with_world(StubWorld::new(1024, 768, 7).with_population(4, 3, area).shared())
    }

    pub fn with_world(world: Arc<Mutex<StubWorld>>) -> Self {
        Self {
            world,
            windows: vec![
                (10001, "Mir Legends - Stub Realm".into()),
                (10002, "Mir Legends - Stub Realm (2)".into()),
                (30001, "Untitled - Notepad".into()),
            ],
        }
    }

    pub fn world(&self) -> Arc<Mutex<StubWorld>> {
        Arc::clone(&self.world)
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StubPlatform {
    fn get_instances(&self, pattern: &str) -> Vec<(WindowId, String)> {
        logger::info_p("stub", &format!("get_instances(\"{}\")", pattern));
        let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(r) => r,
            Err(e) => {
                logger::error(&format!("invalid pattern '{}': {}", pattern, e));
                return Vec::new();
            }
        };
        self.windows.iter().filter(|(_, title)| re.is_match(title)).cloned().collect()
    }

    fn attach(
        &self,
        window_id: WindowId,
        routing: KeyRouting,
        _key_hold: Duration,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn InputSink>)> {
        if !self.windows.iter().any(|(id, _)| *id == window_id) {
            return Err(anyhow!("no stub window with id {}", window_id));
        }
        logger::info_p("stub", &format!("attach({})", window_id));
        Ok((
            Box::new(StubSource::new(self.world())),
            Box::new(StubSink::new(self.world(), routing)),
        ))
    }

    fn activate_window(&self, window_id: WindowId) -> Result<()> {
        if !self.windows.iter().any(|(id, _)| *id == window_id) {
            return Err(anyhow!("no stub window with id {}", window_id));
        }
        let mut world = lock(&self.world).ok_or_else(|| anyhow!("world lock poisoned"))?;
        if world.closed {
            return Err(anyhow!("stub window {} is closed", window_id));
        }
        if world.minimized {
            world.minimized = false;
            logger::info_p("stub", &format!("restored {}", window_id));
        }
        Ok(())
    }

    fn cursor_pos(&self) -> Result<Point> {
        let world = lock(&self.world).ok_or_else(|| anyhow!("world lock poisoned"))?;
        Ok(world.cursor)
    }
}
