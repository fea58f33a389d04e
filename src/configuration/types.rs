/// Inclusive bounds for the swipe distance carried by an instruction.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DistanceRange {
    pub min: i64,
    pub max: i64,
}

impl DistanceRange {
    pub const DEFAULT_MIN: i64 = 300;
    pub const DEFAULT_MAX: i64 = 350;

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for DistanceRange {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}
