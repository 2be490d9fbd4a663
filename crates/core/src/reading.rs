//! Sensor readings and predictions.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::feature::Feature;
use crate::numeric::round2;

/// Canonical timestamp key: the exact string used to deduplicate records in
/// the store (`YYYY-MM-DD HH:MM:SS`, naive UTC).
///
/// Lexicographic order of keys equals chronological order.
pub fn timestamp_key(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One raw sample for one device at one instant, exactly as extracted.
///
/// Transient: a raw reading only lives for the cycle that fetched it and is
/// never persisted. Channels the sensor API did not report are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    /// Source-clock instant, already normalized to naive UTC.
    pub timestamp: NaiveDateTime,
    pub pm1: Option<f64>,
    pub pm25: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub pm03: Option<f64>,
}

impl RawReading {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            pm1: None,
            pm25: None,
            relative_humidity: None,
            temperature: None,
            pm03: None,
        }
    }

    pub fn channel(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Pm1 => self.pm1,
            Feature::Pm25 => self.pm25,
            Feature::RelativeHumidity => self.relative_humidity,
            Feature::Temperature => self.temperature,
            Feature::Pm03 => self.pm03,
            _ => None,
        }
    }

    pub fn set_channel(&mut self, feature: Feature, value: f64) {
        match feature {
            Feature::Pm1 => self.pm1 = Some(value),
            Feature::Pm25 => self.pm25 = Some(value),
            Feature::RelativeHumidity => self.relative_humidity = Some(value),
            Feature::Temperature => self.temperature = Some(value),
            Feature::Pm03 => self.pm03 = Some(value),
            _ => {}
        }
    }
}

/// A cleaned reading: channels rounded to 2 decimals plus the three calendar
/// features derived from the timestamp.
///
/// The timestamp is the unique key; upserts for the same key are
/// last-write-wins. Serde field names match the historical document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    pub timestamp: NaiveDateTime,
    #[serde(rename = "pm1 (µg/m³)")]
    pub pm1: Option<f64>,
    #[serde(rename = "pm25 (µg/m³)")]
    pub pm25: Option<f64>,
    #[serde(rename = "Relative Humidity (%)")]
    pub relative_humidity: Option<f64>,
    #[serde(rename = "Temperature (c)")]
    pub temperature: Option<f64>,
    #[serde(rename = "pm03 (µg/m³)")]
    pub pm03: Option<f64>,
    pub hour: u32,
    pub day_of_week: u32,
    pub month: u32,
}

impl CanonicalReading {
    /// Round every channel to 2 decimals and derive the calendar features.
    ///
    /// Pure and deterministic; outlier filtering is the cleaner's concern.
    pub fn from_raw(raw: &RawReading) -> Self {
        let ts = raw.timestamp;
        Self {
            timestamp: ts,
            pm1: raw.pm1.map(round2),
            pm25: raw.pm25.map(round2),
            relative_humidity: raw.relative_humidity.map(round2),
            temperature: raw.temperature.map(round2),
            pm03: raw.pm03.map(round2),
            hour: ts.hour(),
            // Monday = 0, matching the convention the model was trained with.
            day_of_week: ts.weekday().num_days_from_monday(),
            month: ts.month(),
        }
    }

    /// The canonical store key for this reading.
    pub fn key(&self) -> String {
        timestamp_key(&self.timestamp)
    }

    /// Value of any feature, channel or calendar. Calendar features are
    /// always present.
    pub fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Pm1 => self.pm1,
            Feature::Pm25 => self.pm25,
            Feature::RelativeHumidity => self.relative_humidity,
            Feature::Temperature => self.temperature,
            Feature::Pm03 => self.pm03,
            Feature::Hour => Some(f64::from(self.hour)),
            Feature::DayOfWeek => Some(f64::from(self.day_of_week)),
            Feature::Month => Some(f64::from(self.month)),
        }
    }
}

/// Next-hour forecast of the pollutant target, keyed by the source reading's
/// timestamp. Written once per run; idempotent by key, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: NaiveDateTime,
    pub predicted_pm25: f64,
}

impl Prediction {
    pub fn key(&self) -> String {
        timestamp_key(&self.timestamp)
    }
}
