use std::time::Duration;

use crate::config::HuntConfig;
use crate::error::InputError;
use crate::keys::Key;
use crate::logger;
use crate::platform::{InputSink, MouseButton};
use crate::sleep::Clock;
use crate::types::{DetectedEntity, Point};

/// Click-then-ability sequences against a target, cycling through the ability list.
pub struct CombatCadence {
    abilities: Vec<Key>,
    next: usize,
    loot_key: Key,
    click_settle: Duration,
    skill_interval: Duration,
    attack_interval: Duration,
    loot_delay: Duration,
    loot_settle: Duration,
    /// Clock reading at the end of the last ability cast.
    last_action: Option<Duration>,
}

impl CombatCadence {
    pub fn new(config: &HuntConfig) -> Self {
        Self {
            abilities: config.abilities.clone(),
            next: 0,
            loot_key: config.loot_key,
            click_settle: config.click_settle,
            skill_interval: config.skill_interval,
            attack_interval: config.attack_interval,
            loot_delay: config.loot_delay,
            loot_settle: config.loot_settle,
            last_action: None,
        }
    }

    /// The ability the next cast will use.
    pub fn peek_ability(&self) -> Option<Key> {
        self.abilities.get(self.next).copied()
    }

    fn cast(&mut self, input: &mut dyn InputSink, clock: &dyn Clock) -> Result<(), InputError> {
        let Some(key) = self.peek_ability() else {
            return Ok(());
        };
        self.next = (self.next + 1) % self.abilities.len();
        logger::info_p("engine", &format!("cast {}", key));
        input.send_key(key)?;
        clock.sleep(self.skill_interval);
        self.last_action = Some(clock.now());
        Ok(())
    }

    /// Select the target with a click, then cast one ability.
    pub fn engage(
        &mut self,
        input: &mut dyn InputSink,
        clock: &dyn Clock,
        entity: &DetectedEntity,
    ) -> Result<(), InputError> {
        let pos = entity.click_position();
        logger::info_p("engine", &format!("click target at ({}, {})", pos.x, pos.y));
        input.click(pos, MouseButton::Left, true)?;
        clock.sleep(self.click_settle);
        self.cast(input, clock)
    }

    /// Cast the next ability if `attack_interval` has passed since the last one.
    /// Returns whether a cast happened.
    pub fn follow_up(&mut self, input: &mut dyn InputSink, clock: &dyn Clock) -> Result<bool, InputError> {
        let due = match self.last_action {
            Some(t) => clock.now().saturating_sub(t) >= self.attack_interval,
            None => true,
        };
        if !due {
            return Ok(false);
        }
        self.cast(input, clock)?;
        Ok(true)
    }

    /// Click the corpse, wait for the drop, press the loot key.
    pub fn loot(&mut self, input: &mut dyn InputSink, clock: &dyn Clock, pos: Point) -> Result<(), InputError> {
        logger::info_p("engine", &format!("loot at ({}, {})", pos.x, pos.y));
        input.click(pos, MouseButton::Left, true)?;
        clock.sleep(self.loot_delay);
        input.send_key(self.loot_key)?;
        clock.sleep(self.loot_settle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleep::ManualClock;
    use crate::types::{ClickRule, Rect};

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Click(Point, Duration),
        Key(Key, Duration),
    }

    struct Recorder {
        clock: ManualClock,
        sent: Vec<Sent>,
        fail_keys: bool,
    }

    impl InputSink for Recorder {
        fn click(&mut self, pos: Point, _button: MouseButton, _restore: bool) -> Result<(), InputError> {
            self.sent.push(Sent::Click(pos, self.clock.now()));
            Ok(())
        }

        fn send_key(&mut self, key: Key) -> Result<(), InputError> {
            if self.fail_keys {
                return Err(InputError::WindowInvalid);
            }
            self.sent.push(Sent::Key(key, self.clock.now()));
            Ok(())
        }
    }

    fn setup() -> (CombatCadence, Recorder, ManualClock) {
        let mut cfg = HuntConfig::default();
        cfg.abilities = vec![Key(0x70), Key(0x71), Key(0x72)];
        let clock = ManualClock::new();
        let rec = Recorder { clock: clock.clone(), sent: vec![], fail_keys: false };
        (CombatCadence::new(&cfg), rec, clock)
    }

    fn entity() -> DetectedEntity {
        DetectedEntity::new(Rect::new(100, 100, 20, 4), 80, ClickRule::BelowCenter(40))
    }

    #[test]
    fn engage_clicks_then_casts_after_settle() {
        let (mut cadence, mut rec, clock) = setup();
        cadence.engage(&mut rec, &clock, &entity()).unwrap();
        assert_eq!(
            rec.sent,
            vec![
                Sent::Click(Point::new(110, 142), Duration::ZERO),
                Sent::Key(Key(0x70), Duration::from_millis(200)),
            ]
        );
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn abilities_rotate_and_wrap() {
        let (mut cadence, mut rec, clock) = setup();
        for _ in 0..4 {
            cadence.engage(&mut rec, &clock, &entity()).unwrap();
        }
        let keys: Vec<u16> = rec
            .sent
            .iter()
            .filter_map(|s| match s {
                Sent::Key(k, _) => Some(k.code()),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec![0x70, 0x71, 0x72, 0x70]);
        assert_eq!(cadence.peek_ability(), Some(Key(0x71)));
    }

    #[test]
    fn follow_up_waits_for_attack_interval() {
        let (mut cadence, mut rec, clock) = setup();
        cadence.engage(&mut rec, &clock, &entity()).unwrap();
        clock.advance(Duration::from_millis(500));
        assert!(!cadence.follow_up(&mut rec, &clock).unwrap());
        clock.advance(Duration::from_millis(300));
        assert!(cadence.follow_up(&mut rec, &clock).unwrap());
        assert_eq!(rec.sent.last(), Some(&Sent::Key(Key(0x71), Duration::from_millis(1300))));
    }

    #[test]
    fn loot_clicks_waits_then_presses_loot_key() {
        let (mut cadence, mut rec, clock) = setup();
        cadence.loot(&mut rec, &clock, Point::new(50, 60)).unwrap();
        assert_eq!(
            rec.sent,
            vec![
                Sent::Click(Point::new(50, 60), Duration::ZERO),
                Sent::Key(Key(0x46), Duration::from_secs(2)),
            ]
        );
    }

    #[test]
    fn key_failure_propagates() {
        let (mut cadence, mut rec, clock) = setup();
        rec.fail_keys = true;
        assert_eq!(cadence.engage(&mut rec, &clock, &entity()), Err(InputError::WindowInvalid));
    }
}
