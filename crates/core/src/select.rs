use crate::types::{DetectedEntity, Point};

/// Picks the entity whose click position is nearest a fixed reference point.
#[derive(Debug, Clone, Copy)]
pub struct TargetSelector {
    anchor: Point,
}

impl TargetSelector {
    pub fn new(anchor: Point) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn select(&self, entities: &[DetectedEntity]) -> Option<DetectedEntity> {
        select(entities, self.anchor)
    }
}

/// Nearest entity to `anchor` by Euclidean distance; the first listed wins ties.
pub fn select(entities: &[DetectedEntity], anchor: Point) -> Option<DetectedEntity> {
    let mut best: Option<(i64, &DetectedEntity)> = None;
    for e in entities {
        let d = e.click_position().distance_sq(anchor);
        match best {
            Some((bd, _)) if bd <= d => {}
            _ => best = Some((d, e)),
        }
    }
    best.map(|(_, e)| *e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClickRule, Rect};

    fn at(x: i32, y: i32) -> DetectedEntity {
        DetectedEntity::new(Rect::new(x - 5, y - 1, 10, 3), 30, ClickRule::Center)
    }

    #[test]
    fn empty_set_selects_nothing() {
        assert_eq!(select(&[], Point::new(0, 0)), None);
    }

    #[test]
    fn nearest_wins() {
        let entities = [at(400, 400), at(110, 95), at(10, 10)];
        let picked = select(&entities, Point::new(100, 100)).unwrap();
        assert_eq!(picked, entities[1]);
    }

    #[test]
    fn ties_go_to_first_listed() {
        let a = at(110, 100);
        let b = at(90, 100);
        let c = at(100, 110);
        assert_eq!(select(&[a, b, c], Point::new(100, 100)), Some(a));
        assert_eq!(select(&[c, b, a], Point::new(100, 100)), Some(c));
    }

    #[test]
    fn matches_brute_force_minimum() {
        let anchor = Point::new(320, 240);
        let entities: Vec<_> = (0..40)
            .map(|i| at((i * 37) % 640, (i * 53) % 480))
            .collect();
        let picked = TargetSelector::new(anchor).select(&entities).unwrap();
        let best = entities
            .iter()
            .map(|e| e.click_position().distance_sq(anchor))
            .min()
            .unwrap();
        assert_eq!(picked.click_position().distance_sq(anchor), best);
        let first = entities
            .iter()
            .find(|e| e.click_position().distance_sq(anchor) == best)
            .unwrap();
        assert_eq!(&picked, first);
    }
}
