use rand::Rng;

use crate::configuration::types::DistanceRange;
use crate::error_handling::types::ConfigError;

/// Number of distinct swipe directions; directions are `0..DIRECTIONS`.
pub const DIRECTIONS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gesture {
    pub direction: u8,
    pub distance: i64,
}

/// Produces uniformly random gestures within fixed bounds.
///
/// The generator holds nothing but its bounds, so it is `Copy` and can be
/// shared freely between sessions.
#[derive(Debug, Clone, Copy)]
pub struct GestureGenerator {
    range: DistanceRange,
}

impl GestureGenerator {
    /// Fails with `ConfigError::NotInRange` when `range.min > range.max`.
    pub fn new(range: DistanceRange) -> Result<Self, ConfigError> {
        if range.min > range.max {
            return Err(ConfigError::NotInRange(format!(
                "empty distance range {}..={}",
                range.min, range.max
            )));
        }
        Ok(Self { range })
    }

    pub fn range(&self) -> DistanceRange {
        self.range
    }

    pub fn generate(&self) -> Gesture {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Gesture {
        Gesture {
            direction: rng.gen_range(0..DIRECTIONS),
            distance: rng.gen_range(self.range.min..=self.range.max),
        }
    }
}

impl Default for GestureGenerator {
    fn default() -> Self {
        Self {
            range: DistanceRange::default(),
        }
    }
}
