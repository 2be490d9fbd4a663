//! Feature identifiers.
//!
//! The original deployment addressed document fields by string label; here
//! every monitored channel and derived calendar feature is a closed enum
//! variant, and the string form only appears at the persistence boundary.

use serde::{Deserialize, Serialize};

/// One feature of a canonical reading: a raw sensor channel or a calendar
/// feature derived from the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Pm1,
    Pm25,
    RelativeHumidity,
    Temperature,
    Pm03,
    Hour,
    DayOfWeek,
    Month,
}

impl Feature {
    /// The five raw sensor channels (everything a reading carries besides
    /// its timestamp).
    pub const CHANNELS: [Feature; 5] = [
        Feature::Pm1,
        Feature::Pm25,
        Feature::RelativeHumidity,
        Feature::Temperature,
        Feature::Pm03,
    ];

    /// The fixed, ordered 7-element input the model consumes.
    ///
    /// `Pm25` is the prediction target and is never an input.
    pub const MODEL_INPUTS: [Feature; 7] = [
        Feature::Pm1,
        Feature::RelativeHumidity,
        Feature::Temperature,
        Feature::Pm03,
        Feature::Hour,
        Feature::DayOfWeek,
        Feature::Month,
    ];

    /// Persisted document field name (kept byte-compatible with the
    /// historical collection layout).
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Pm1 => "pm1 (µg/m³)",
            Feature::Pm25 => "pm25 (µg/m³)",
            Feature::RelativeHumidity => "Relative Humidity (%)",
            Feature::Temperature => "Temperature (c)",
            Feature::Pm03 => "pm03 (µg/m³)",
            Feature::Hour => "hour",
            Feature::DayOfWeek => "day_of_week",
            Feature::Month => "month",
        }
    }

    pub fn is_channel(&self) -> bool {
        Feature::CHANNELS.contains(self)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
