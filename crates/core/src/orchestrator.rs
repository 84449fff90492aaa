use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::engine::Engine;
use crate::keys::KeyRouting;
use crate::logger;
use crate::platform::Platform;
use crate::settings::Settings;
use crate::sleep::SystemClock;
use crate::types::*;

fn with_status<R>(status: &Mutex<HuntStatus>, f: impl FnOnce(&mut HuntStatus) -> R) -> Option<R> {
    status.lock().ok().map(|mut s| f(&mut s))
}

/// Re-enumerate windows matching `pattern`. Keeps the current selection if its
/// window survived, otherwise falls back to the last window title used.
pub fn scan_windows(status: &Mutex<HuntStatus>, platform: &dyn Platform, pattern: &str, last_title: Option<&str>) {
    let windows: Vec<WindowEntry> = platform
        .get_instances(pattern)
        .into_iter()
        .map(|(id, title)| WindowEntry { id, title })
        .collect();
    logger::info(&format!("{} window(s) match \"{}\"", windows.len(), pattern));

    with_status(status, |s| {
        let previous = s.selected_window().map(|w| w.id);
        s.selected = previous
            .and_then(|id| windows.iter().position(|w| w.id == id))
            .or_else(|| last_title.and_then(|t| windows.iter().position(|w| w.title == t)));
        s.windows = windows;
    });
}

/// Engine thread state between panel commands.
pub struct Orchestrator {
    platform: Box<dyn Platform>,
    settings: Settings,
    settings_path: Option<PathBuf>,
    status: Arc<Mutex<HuntStatus>>,
    engine: Option<Engine>,
}

impl Orchestrator {
    pub fn new(
        platform: Box<dyn Platform>,
        settings: Settings,
        settings_path: Option<PathBuf>,
        status: Arc<Mutex<HuntStatus>>,
    ) -> Self {
        Self { platform, settings, settings_path, status, engine: None }
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    pub fn rescan(&mut self) {
        scan_windows(
            &self.status,
            self.platform.as_ref(),
            &self.settings.window_pattern,
            self.settings.last_window_title.as_deref(),
        );
    }

    pub fn start(&mut self) {
        let Some(window) = with_status(&self.status, |s| s.selected_window().cloned()).flatten() else {
            logger::warn("no window selected, press space on a window first");
            with_status(&self.status, |s| s.run_state = RunState::Stopped);
            return;
        };

        if let Err(e) = self.platform.activate_window(window.id) {
            logger::warn(&format!("could not activate \"{}\": {}", window.title, e));
        }

        let config = self.settings.hunt.clone();
        let attached = self.platform.attach(window.id, KeyRouting::standard(), config.key_hold);
        #[allow(unused_mut)]
        let (mut source, input) = match attached {
            Ok(pair) => pair,
            Err(e) => {
                self.fail(format!("attach {} failed: {}", window.title, e));
                return;
            }
        };

        // Keep the first frame for offline detector tuning
        #[cfg(feature = "debug-capture")]
        match source.capture() {
            Ok(frame) => match frame.save_png(std::path::Path::new("logs/attach.png")) {
                Ok(()) => logger::info("saved first frame to logs/attach.png"),
                Err(e) => logger::warn(&format!("could not save first frame: {}", e)),
            },
            Err(e) => logger::warn(&format!("first capture failed: {}", e)),
        }

        let clock = Box::new(SystemClock::with_jitter(config.jitter));
        let engine = match Engine::new(config, source, input, clock) {
            Ok(e) => e.with_status(Arc::clone(&self.status)),
            Err(e) => {
                self.fail(format!("invalid hunt config: {}", e));
                return;
            }
        };

        logger::info(&format!("hunting in \"{}\"", window.title));
        self.engine = Some(engine);
        with_status(&self.status, |s| {
            s.run_state = RunState::Running;
            s.error = None;
            s.stats = HuntStats::default();
        });

        self.settings.last_window_title = Some(window.title);
        if let Some(path) = &self.settings_path {
            self.settings.save(path);
        }
    }

    /// Stop at the next poll point. An acquired target is still attacked and a
    /// confirmed kill still looted before the engine is dropped.
    pub fn stop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            if !engine.phase().is_poll_point() {
                logger::info("finishing the current engagement step before stopping");
                if let Err(e) = engine.settle() {
                    self.fail(format!("hunt aborted while stopping: {}", e));
                    return;
                }
            }
        }
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(engine) = self.engine.take() {
            let stats = engine.stats();
            logger::info(&format!(
                "hunt stopped: {} kills, {} abandoned, {} engagements",
                stats.kills, stats.abandoned, stats.engagements
            ));
        }
        with_status(&self.status, |s| {
            s.run_state = RunState::Stopped;
            s.phase = Phase::Searching;
            s.target = None;
        });
    }

    fn fail(&mut self, msg: String) {
        logger::error(&msg);
        self.halt();
        with_status(&self.status, |s| s.error = Some(msg));
    }

    /// Apply one panel command. Returns false on Quit.
    pub fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Quit => {
                logger::info("shutting down");
                self.stop();
                return false;
            }
            Command::Select(idx) => {
                let title = with_status(&self.status, |s| {
                    let title = s.windows.get(idx).map(|w| w.title.clone());
                    if title.is_some() {
                        s.selected = Some(idx);
                    }
                    title
                })
                .flatten();
                if let Some(title) = title {
                    logger::info(&format!("selected \"{}\"", title));
                    if self.is_running() {
                        logger::info("selection takes effect on the next start");
                    }
                }
            }
            Command::StartStop => {
                if self.is_running() {
                    self.stop();
                } else {
                    self.start();
                }
            }
            Command::Rescan => self.rescan(),
        }
        true
    }

    /// Advance the running engine by one transition, if any.
    pub fn tick(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            std::thread::sleep(Duration::from_millis(100));
            return;
        };
        if let Err(e) = engine.step() {
            self.fail(format!("hunt aborted: {}", e));
        }
    }
}

/// Main orchestration loop. Runs on a background thread until Quit.
pub fn orchestrate(mut orch: Orchestrator, cmd_rx: mpsc::Receiver<Command>, stop: Arc<AtomicBool>) {
    loop {
        // Stay responsive: drain commands between every engine step
        loop {
            match cmd_rx.try_recv() {
                Ok(cmd) => {
                    if !orch.handle(cmd) {
                        return;
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    orch.stop();
                    return;
                }
            }
        }

        if stop.swap(false, Ordering::AcqRel) && orch.is_running() {
            logger::info("stop hotkey pressed");
            orch.stop();
        }

        orch.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::{StubPlatform, StubWorld};

    fn orchestrator() -> (Orchestrator, Arc<Mutex<HuntStatus>>, Arc<Mutex<StubWorld>>) {
        let world = StubWorld::new(640, 480, 1).shared();
        world.lock().unwrap().spawn(Rect::new(300, 200, 30, 4), 1);
        let status = Arc::new(Mutex::new(HuntStatus::new(vec![])));
        let mut settings = Settings::default();
        settings.window_pattern = "stub realm".into();
        // Orchestrated engines sleep on the real clock.
        let ms = Duration::from_millis(5);
        let hunt = &mut settings.hunt;
        hunt.skill_interval = ms;
        hunt.check_interval = ms;
        hunt.loot_delay = ms;
        hunt.poll_interval = ms;
        hunt.rest_after_engagement = ms;
        hunt.click_settle = ms;
        hunt.loot_settle = ms;
        let orch = Orchestrator::new(
            Box::new(StubPlatform::with_world(Arc::clone(&world))),
            settings,
            None,
            Arc::clone(&status),
        );
        (orch, status, world)
    }

    #[test]
    fn rescan_lists_matching_windows() {
        let (mut orch, status, _) = orchestrator();
        orch.rescan();
        let s = status.lock().unwrap();
        assert_eq!(s.windows.len(), 2);
        assert_eq!(s.selected, None);
    }

    #[test]
    fn start_without_selection_stays_stopped() {
        let (mut orch, status, _) = orchestrator();
        orch.rescan();
        assert!(orch.handle(Command::StartStop));
        assert!(!orch.is_running());
        assert_eq!(status.lock().unwrap().run_state, RunState::Stopped);
    }

    #[test]
    fn select_start_stop_quit() {
        let (mut orch, status, _) = orchestrator();
        orch.rescan();
        orch.handle(Command::Select(1));
        orch.handle(Command::StartStop);
        assert!(orch.is_running());
        assert_eq!(status.lock().unwrap().run_state, RunState::Running);

        orch.tick();
        assert_eq!(status.lock().unwrap().phase, Phase::Acquired);

        orch.handle(Command::StartStop);
        assert!(!orch.is_running());
        assert_eq!(status.lock().unwrap().run_state, RunState::Stopped);
        assert!(!orch.handle(Command::Quit));
    }

    #[test]
    fn selection_survives_rescan_and_last_title_is_restored() {
        let (mut orch, status, _) = orchestrator();
        orch.rescan();
        orch.handle(Command::Select(1));
        orch.rescan();
        assert_eq!(status.lock().unwrap().selected, Some(1));

        status.lock().unwrap().selected = None;
        orch.settings.last_window_title = Some("Mir Legends - Stub Realm".into());
        orch.rescan();
        assert_eq!(status.lock().unwrap().selected, Some(0));
    }

    #[test]
    fn stop_while_acquired_finishes_the_attack() {
        let (mut orch, status, world) = orchestrator();
        orch.rescan();
        orch.handle(Command::Select(0));
        orch.handle(Command::StartStop);
        orch.tick();
        assert_eq!(status.lock().unwrap().phase, Phase::Acquired);

        orch.handle(Command::StartStop);
        assert!(!orch.is_running());
        let w = world.lock().unwrap();
        assert_eq!(w.kills(), 1);
        assert_eq!(w.loots(), 0);
    }

    #[test]
    fn hotkey_stop_after_kill_still_loots() {
        let (mut orch, status, world) = orchestrator();
        orch.rescan();
        orch.handle(Command::Select(0));
        orch.handle(Command::StartStop);
        for _ in 0..10 {
            if status.lock().unwrap().phase == Phase::Looted {
                break;
            }
            orch.tick();
        }
        assert_eq!(status.lock().unwrap().phase, Phase::Looted);

        let (tx, rx) = mpsc::channel();
        let runner = std::thread::spawn(move || orchestrate(orch, rx, Arc::new(AtomicBool::new(true))));
        for _ in 0..200 {
            if status.lock().unwrap().run_state == RunState::Stopped {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        tx.send(Command::Quit).unwrap();
        runner.join().unwrap();

        assert_eq!(status.lock().unwrap().run_state, RunState::Stopped);
        assert_eq!(world.lock().unwrap().loots(), 1);
    }

    #[test]
    fn start_restores_a_minimized_window() {
        let (mut orch, status, world) = orchestrator();
        world.lock().unwrap().minimize();
        orch.rescan();
        orch.handle(Command::Select(0));
        orch.handle(Command::StartStop);
        assert!(!world.lock().unwrap().is_minimized());

        orch.tick();
        assert_eq!(status.lock().unwrap().phase, Phase::Acquired);
        assert_eq!(status.lock().unwrap().stats.capture_failures, 0);
    }
}
