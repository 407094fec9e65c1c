use crate::db::types::CognitiveLevel;

/// Lower bounds, highest band first. Each bound belongs to its own band.
const THRESHOLDS: [(f64, CognitiveLevel); 5] = [
    (0.85, CognitiveLevel::Create),
    (0.70, CognitiveLevel::Evaluate),
    (0.55, CognitiveLevel::Analyze),
    (0.40, CognitiveLevel::Apply),
    (0.25, CognitiveLevel::Understand),
];

impl CognitiveLevel {
    /// Maps a closeness score to its band. NaN falls through to `Remember`.
    pub(crate) fn from_score(score: f64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(bound, _)| score >= *bound)
            .map(|(_, level)| *level)
            .unwrap_or(CognitiveLevel::Remember)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_bound(level: CognitiveLevel) -> f64 {
        THRESHOLDS
            .iter()
            .find(|(_, candidate)| *candidate == level)
            .map(|(bound, _)| *bound)
            .unwrap_or(0.0)
    }

    #[test]
    fn boundaries_belong_to_the_higher_band() {
        assert_eq!(CognitiveLevel::from_score(0.85), CognitiveLevel::Create);
        assert_eq!(CognitiveLevel::from_score(0.70), CognitiveLevel::Evaluate);
        assert_eq!(CognitiveLevel::from_score(0.55), CognitiveLevel::Analyze);
        assert_eq!(CognitiveLevel::from_score(0.40), CognitiveLevel::Apply);
        assert_eq!(CognitiveLevel::from_score(0.25), CognitiveLevel::Understand);
    }

    #[test]
    fn just_below_a_boundary_stays_in_the_lower_band() {
        assert_eq!(CognitiveLevel::from_score(0.8499), CognitiveLevel::Evaluate);
        assert_eq!(CognitiveLevel::from_score(0.2499), CognitiveLevel::Remember);
        assert_eq!(CognitiveLevel::from_score(0.0), CognitiveLevel::Remember);
        assert_eq!(CognitiveLevel::from_score(1.0), CognitiveLevel::Create);
    }

    #[test]
    fn every_score_maps_to_a_non_decreasing_level() {
        let mut previous = CognitiveLevel::Remember;
        for step in 0..=1000 {
            let score = f64::from(step) / 1000.0;
            let level = CognitiveLevel::from_score(score);
            assert!(level >= previous, "{score} mapped below {previous:?}");
            assert!(score >= lower_bound(level));
            previous = level;
        }
        assert_eq!(previous, CognitiveLevel::Create);
    }

    #[test]
    fn nan_is_remember() {
        assert_eq!(CognitiveLevel::from_score(f64::NAN), CognitiveLevel::Remember);
    }
}
