//! Mapping between the engine's 0-100 volume and the 1-10 user scale.

/// Convert a user-facing level (1-10) to an engine volume (10-100).
pub fn level_to_engine(level: i64) -> i64 {
    level.clamp(1, 10) * 10
}

/// Convert an engine volume (0-100) to a user-facing level (1-10).
///
/// An engine volume of 0 maps to level 1; the user scale has no mute notch.
pub fn engine_to_level(volume: f64) -> i64 {
    let v = if volume.is_finite() {
        volume.clamp(0.0, 100.0)
    } else {
        0.0
    };
    ((v / 10.0).round() as i64).clamp(1, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_engine_clamps_and_scales() {
        assert_eq!(level_to_engine(1), 10);
        assert_eq!(level_to_engine(10), 100);
        assert_eq!(level_to_engine(0), 10);
        assert_eq!(level_to_engine(-3), 10);
        assert_eq!(level_to_engine(42), 100);
    }

    #[test]
    fn round_trips_every_level() {
        for level in 1..=10 {
            assert_eq!(engine_to_level(level_to_engine(level) as f64), level);
        }
    }

    #[test]
    fn engine_to_level_stays_in_range() {
        for volume in 0..=100 {
            let level = engine_to_level(volume as f64);
            assert!((1..=10).contains(&level), "volume {volume} -> {level}");
        }
    }

    #[test]
    fn zero_and_extremes_map_to_valid_levels() {
        assert_eq!(engine_to_level(0.0), 1);
        assert_eq!(engine_to_level(4.0), 1);
        assert_eq!(engine_to_level(100.0), 10);
        assert_eq!(engine_to_level(250.0), 10);
        assert_eq!(engine_to_level(-10.0), 1);
        assert_eq!(engine_to_level(f64::NAN), 1);
    }
}
