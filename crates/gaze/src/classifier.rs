//! Direction classification
//!
//! A pupil offset only produces a vote when it clears the base threshold
//! (a fraction of the region size) inflated by the hysteresis factor. The
//! band between center and that bound is the dead zone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::config::ClassifierConfig;
use crate::pupil::Point2D;

/// Committed game direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// The 180° reversal of this direction
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Map a spoken transcript to a direction.
    ///
    /// When several direction words are present the fixed precedence
    /// up, down, left, right decides, not their order in the transcript.
    pub fn from_keyword(transcript: &str) -> Option<Direction> {
        let words: Vec<String> = transcript
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .collect();
        Direction::ALL
            .into_iter()
            .find(|d| words.iter().any(|w| w == d.as_str()))
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-frame classifier output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionVote {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl DirectionVote {
    pub fn direction(self) -> Option<Direction> {
        match self {
            DirectionVote::Up => Some(Direction::Up),
            DirectionVote::Down => Some(Direction::Down),
            DirectionVote::Left => Some(Direction::Left),
            DirectionVote::Right => Some(Direction::Right),
            DirectionVote::None => None,
        }
    }
}

impl From<Direction> for DirectionVote {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => DirectionVote::Up,
            Direction::Down => DirectionVote::Down,
            Direction::Left => DirectionVote::Left,
            Direction::Right => DirectionVote::Right,
        }
    }
}

/// Dead-zone classifier over pupil offsets
#[derive(Debug, Clone)]
pub struct DirectionClassifier {
    threshold_fraction: f32,
    hysteresis: f32,
}

impl DirectionClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            threshold_fraction: config.threshold_fraction,
            hysteresis: config.hysteresis,
        }
    }

    /// Per-axis vote bounds `(x, y)` for a region of the given size
    pub fn effective_thresholds(&self, width: f32, height: f32) -> (f32, f32) {
        self.bounds(self.threshold_fraction, self.threshold_fraction, width, height)
    }

    fn bounds(&self, x_fraction: f32, y_fraction: f32, width: f32, height: f32) -> (f32, f32) {
        (x_fraction * width * self.hysteresis, y_fraction * height * self.hysteresis)
    }

    /// Classify relative to the geometric center of the region
    pub fn classify(&self, pupil: Point2D, width: f32, height: f32) -> DirectionVote {
        self.classify_from(pupil, Point2D::new(width / 2.0, height / 2.0), width, height)
    }

    /// Classify relative to an explicit origin with the base thresholds
    pub fn classify_from(&self, pupil: Point2D, origin: Point2D, width: f32, height: f32) -> DirectionVote {
        Self::vote(pupil.offset_from(origin), self.effective_thresholds(width, height))
    }

    /// Classify against a calibration: its center is the origin and its
    /// per-axis thresholds replace the base fraction
    pub fn classify_calibrated(
        &self,
        pupil: Point2D,
        calibration: &Calibration,
        width: f32,
        height: f32,
    ) -> DirectionVote {
        let bounds = self.bounds(calibration.thresholds.x, calibration.thresholds.y, width, height);
        Self::vote(pupil.offset_from(calibration.origin()), bounds)
    }

    fn vote(offset: Point2D, (x_bound, y_bound): (f32, f32)) -> DirectionVote {
        if offset.x.abs() > offset.y.abs() {
            if offset.x > x_bound {
                DirectionVote::Right
            } else if offset.x < -x_bound {
                DirectionVote::Left
            } else {
                DirectionVote::None
            }
        } else if offset.y > y_bound {
            DirectionVote::Down
        } else if offset.y < -y_bound {
            DirectionVote::Up
        } else {
            DirectionVote::None
        }
    }
}

impl Default for DirectionClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_left_vote_from_calibrated_center() {
        // 100x100 region: threshold 15, effective 18; offset -30
        let classifier = DirectionClassifier::default();
        let vote = classifier.classify_from(Point2D::new(20.0, 50.0), Point2D::new(50.0, 50.0), 100.0, 100.0);
        assert_eq!(vote, DirectionVote::Left);
    }

    #[test]
    fn test_each_direction() {
        let classifier = DirectionClassifier::default();
        assert_eq!(classifier.classify(Point2D::new(80.0, 50.0), 100.0, 100.0), DirectionVote::Right);
        assert_eq!(classifier.classify(Point2D::new(50.0, 10.0), 100.0, 100.0), DirectionVote::Up);
        assert_eq!(classifier.classify(Point2D::new(50.0, 90.0), 100.0, 100.0), DirectionVote::Down);
        assert_eq!(classifier.classify(Point2D::new(10.0, 50.0), 100.0, 100.0), DirectionVote::Left);
    }

    #[test]
    fn test_dead_zone() {
        let classifier = DirectionClassifier::default();
        // Past the 15px base threshold but inside the 18px effective bound
        assert_eq!(classifier.classify(Point2D::new(66.0, 50.0), 100.0, 100.0), DirectionVote::None);
        assert_eq!(classifier.classify(Point2D::new(50.0, 50.0), 100.0, 100.0), DirectionVote::None);
    }

    #[test]
    fn test_dominant_axis_decides() {
        let classifier = DirectionClassifier::default();
        // Large x offset wins even though y alone would clear its bound
        assert_eq!(classifier.classify(Point2D::new(95.0, 75.0), 100.0, 100.0), DirectionVote::Right);
        // 100x50: x bound 18, y bound 9. Offset (17, 16) is x-dominant and
        // inside the x dead zone, so the y excursion is ignored
        assert_eq!(classifier.classify(Point2D::new(67.0, 41.0), 100.0, 50.0), DirectionVote::None);
    }

    #[test]
    fn test_thresholds_follow_region_shape() {
        let classifier = DirectionClassifier::default();
        let (x, y) = classifier.effective_thresholds(200.0, 50.0);
        assert!((x - 36.0).abs() < 1e-4);
        assert!((y - 9.0).abs() < 1e-4);
        assert_eq!(classifier.classify(Point2D::new(100.0, 14.0), 200.0, 50.0), DirectionVote::Up);
    }

    fn calibration_with_span(span: f32) -> Calibration {
        use crate::calibration::{Anchor, CalibrationProfile};
        use crate::pupil::PupilSample;

        let mut profile = CalibrationProfile::new();
        for (anchor, (x, y)) in [
            (Anchor::Center, (50.0, 50.0)),
            (Anchor::Left, (50.0 - span, 50.0)),
            (Anchor::Right, (50.0 + span, 50.0)),
            (Anchor::Up, (50.0, 50.0 - span)),
            (Anchor::Down, (50.0, 50.0 + span)),
        ] {
            profile.set(
                anchor,
                PupilSample {
                    position: Point2D::new(x, y),
                    sequence: 0,
                },
            );
        }
        profile.complete((100.0, 100.0), &ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn test_calibrated_span_changes_vote() {
        let classifier = DirectionClassifier::default();
        let pupil = Point2D::new(30.0, 50.0);

        // Span 25: threshold 0.125 -> bound 15, offset 20 votes
        let short_travel = calibration_with_span(25.0);
        assert_eq!(
            classifier.classify_calibrated(pupil, &short_travel, 100.0, 100.0),
            DirectionVote::Left
        );

        // Span 40: threshold 0.2 -> bound 24, same offset stays in the dead zone
        let long_travel = calibration_with_span(40.0);
        assert_eq!(
            classifier.classify_calibrated(pupil, &long_travel, 100.0, 100.0),
            DirectionVote::None
        );
    }

    #[test]
    fn test_keyword_mapping() {
        assert_eq!(Direction::from_keyword("go LEFT now"), Some(Direction::Left));
        assert_eq!(Direction::from_keyword("up, then down"), Some(Direction::Up));
        assert_eq!(Direction::from_keyword("left then up"), Some(Direction::Up));
        assert_eq!(Direction::from_keyword("right or down"), Some(Direction::Down));
        assert_eq!(Direction::from_keyword("upward"), None);
        assert_eq!(Direction::from_keyword(""), None);
    }

    #[test]
    fn test_opposites() {
        for d in Direction::ALL {
            assert_ne!(d, d.opposite());
            assert_eq!(d, d.opposite().opposite());
        }
    }

    proptest! {
        #[test]
        fn classify_is_scale_invariant(
            w in 10.0f32..400.0,
            h in 10.0f32..400.0,
            dx in -200.0f32..200.0,
            dy in -200.0f32..200.0,
            exp in 0usize..5,
        ) {
            // Power-of-two factors keep the scaled arithmetic exact
            let k = [0.25f32, 0.5, 2.0, 4.0, 8.0][exp];
            let classifier = DirectionClassifier::default();
            let base = classifier.classify(Point2D::new(w / 2.0 + dx, h / 2.0 + dy), w, h);
            let scaled = classifier.classify(
                Point2D::new((w / 2.0 + dx) * k, (h / 2.0 + dy) * k),
                w * k,
                h * k,
            );
            prop_assert_eq!(base, scaled);
        }
    }
}
