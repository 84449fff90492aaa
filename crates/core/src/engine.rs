//! The hunt loop: search, engage, confirm the kill, loot or abandon.
//!
//! `Engine::step` performs exactly one phase transition so the machine can be
//! driven one move at a time (the control panel thread does this between
//! command checks, tests do it against a virtual clock).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::combat::CombatCadence;
use crate::config::HuntConfig;
use crate::detect::EntityDetector;
use crate::error::{ConfigError, EngineError};
use crate::logger;
use crate::platform::{FrameSource, InputSink};
use crate::select::TargetSelector;
use crate::sleep::Clock;
use crate::track::{AnchorMatcher, TargetMatcher};
use crate::types::*;

/// The one target currently being pursued. The machine's phase lives on
/// [`Engine::phase`] and the kill count on [`HuntStats::kills`], since both
/// outlive any single engagement.
#[derive(Debug, Clone, Copy)]
pub struct Engagement {
    /// Bbox origin at acquisition; the only notion of "same target".
    pub anchor: Point,
    pub target: DetectedEntity,
    /// Clock reading when the engagement entered AwaitingDeathConfirmation.
    pub started_at: Duration,
    pub check_count: u32,
}

pub struct Engine {
    config: HuntConfig,
    detector: EntityDetector,
    selector: TargetSelector,
    matcher: Box<dyn TargetMatcher>,
    cadence: CombatCadence,
    source: Box<dyn FrameSource>,
    input: Box<dyn InputSink>,
    clock: Box<dyn Clock>,
    phase: Phase,
    engagement: Option<Engagement>,
    stats: HuntStats,
    status: Option<Arc<Mutex<HuntStatus>>>,
}

impl Engine {
    pub fn new(
        config: HuntConfig,
        source: Box<dyn FrameSource>,
        input: Box<dyn InputSink>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            detector: EntityDetector::new(config.detector.clone()),
            selector: TargetSelector::new(config.player_anchor()),
            matcher: Box::new(AnchorMatcher::new(config.anchor_tolerance)),
            cadence: CombatCadence::new(&config),
            config,
            source,
            input,
            clock,
            phase: Phase::Searching,
            engagement: None,
            stats: HuntStats::default(),
            status: None,
        })
    }

    /// Replace the positional re-matching rule.
    pub fn with_matcher(mut self, matcher: Box<dyn TargetMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Mirror phase, target and stats into `status` after every step.
    pub fn with_status(mut self, status: Arc<Mutex<HuntStatus>>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> HuntStats {
        self.stats
    }

    pub fn engagement(&self) -> Option<&Engagement> {
        self.engagement.as_ref()
    }

    /// Advance the machine by one transition and return the new phase.
    /// Only input delivery failures are errors.
    pub fn step(&mut self) -> Result<Phase, EngineError> {
        let next = match self.phase {
            Phase::Searching => self.search()?,
            Phase::Acquired => Phase::Attacking,
            Phase::Attacking => self.attack()?,
            Phase::AwaitingDeathConfirmation => self.check()?,
            Phase::Looted => self.loot()?,
            Phase::Abandoned => self.abandon(),
        };
        if next != self.phase {
            logger::info_p("engine", &format!("{} -> {}", self.phase.label(), next.label()));
        }
        self.phase = next;
        self.publish();
        Ok(next)
    }

    /// Step until the machine rests at a poll point (Searching or
    /// AwaitingDeathConfirmation), finishing any attack or loot in progress.
    pub fn settle(&mut self) -> Result<Phase, EngineError> {
        while !self.phase.is_poll_point() {
            self.step()?;
        }
        Ok(self.phase)
    }

    /// Step until `stop` is raised. The flag is only honored at poll points, so
    /// an acquired target is still attacked and a confirmed kill still looted.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<HuntStats, EngineError> {
        logger::info_p("engine", "hunt started");
        while !(self.phase.is_poll_point() && stop.load(Ordering::SeqCst)) {
            if let Err(e) = self.step() {
                logger::error_p("engine", &format!("run aborted: {}", e));
                return Err(e);
            }
        }
        logger::info_p(
            "engine",
            &format!("hunt stopped: {} kills, {} abandoned", self.stats.kills, self.stats.abandoned),
        );
        Ok(self.stats)
    }

    /// Capture and detect. A failed capture or an unusable frame both mean
    /// "no frame this cycle".
    fn observe(&mut self) -> Option<Vec<DetectedEntity>> {
        let detected = match self.source.capture() {
            Ok(frame) => self.detector.detect_default(&frame).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match detected {
            Ok(entities) => Some(entities),
            Err(e) => {
                self.stats.capture_failures += 1;
                logger::warn_p("engine", &format!("capture failed: {}", e));
                None
            }
        }
    }

    fn search(&mut self) -> Result<Phase, EngineError> {
        let Some(entities) = self.observe() else {
            self.clock.sleep(self.config.poll_interval);
            return Ok(Phase::Searching);
        };
        let Some(target) = self.selector.select(&entities) else {
            self.clock.sleep(self.config.poll_interval);
            return Ok(Phase::Searching);
        };
        let anchor = target.bbox().origin();
        logger::info_p(
            "detect",
            &format!(
                "{} candidates, target at ({}, {}) size {}x{}",
                entities.len(),
                anchor.x,
                anchor.y,
                target.bbox().w,
                target.bbox().h
            ),
        );
        self.stats.engagements += 1;
        self.engagement = Some(Engagement { anchor, target, started_at: self.clock.now(), check_count: 0 });
        Ok(Phase::Acquired)
    }

    fn attack(&mut self) -> Result<Phase, EngineError> {
        let Some(mut engagement) = self.engagement else {
            return Ok(Phase::Searching);
        };
        self.cadence.engage(self.input.as_mut(), self.clock.as_ref(), &engagement.target)?;
        engagement.started_at = self.clock.now();
        self.engagement = Some(engagement);
        Ok(Phase::AwaitingDeathConfirmation)
    }

    fn check(&mut self) -> Result<Phase, EngineError> {
        let Some(mut engagement) = self.engagement else {
            return Ok(Phase::Searching);
        };
        self.clock.sleep(self.config.check_interval);
        if self.config.follow_up_attacks {
            self.cadence.follow_up(self.input.as_mut(), self.clock.as_ref())?;
        }
        engagement.check_count += 1;
        self.stats.checks += 1;

        // A missing frame is neither a death nor a sighting.
        if let Some(entities) = self.observe() {
            if !self.matcher.still_present(engagement.anchor, &entities) {
                self.stats.kills += 1;
                logger::info_p(
                    "engine",
                    &format!("target gone after {} checks, kill #{}", engagement.check_count, self.stats.kills),
                );
                self.engagement = Some(engagement);
                return Ok(Phase::Looted);
            }
        }

        let elapsed = self.clock.now().saturating_sub(engagement.started_at);
        self.engagement = Some(engagement);
        if elapsed >= self.config.max_attack_wait {
            logger::warn_p("engine", &format!("target still present after {:.1}s", elapsed.as_secs_f64()));
            return Ok(Phase::Abandoned);
        }
        Ok(Phase::AwaitingDeathConfirmation)
    }

    fn loot(&mut self) -> Result<Phase, EngineError> {
        if let Some(engagement) = self.engagement.take() {
            let pos = engagement.target.click_position();
            self.cadence.loot(self.input.as_mut(), self.clock.as_ref(), pos)?;
        }
        self.clock.sleep(self.config.rest_after_engagement);
        Ok(Phase::Searching)
    }

    fn abandon(&mut self) -> Phase {
        self.engagement = None;
        self.stats.abandoned += 1;
        self.clock.sleep(self.config.rest_after_engagement);
        Phase::Searching
    }

    fn publish(&self) {
        let Some(status) = &self.status else { return };
        if let Ok(mut s) = status.lock() {
            s.phase = self.phase;
            s.target = self.engagement.map(|e| e.target.click_position());
            s.stats = self.stats;
        }
    }
}
