//! OpenWeather payloads to the provider-agnostic schema.
//!
//! Raw JSON is first deserialized into strict structs mirroring the provider
//! schema, so a missing required field or a wrong type fails here with a
//! [`NormalizationError`] instead of turning into a plausible-looking zero.
//! Optional fields fall back to fixed defaults:
//!
//! | field        | default                                  |
//! |--------------|------------------------------------------|
//! | humidity     | 0                                        |
//! | wind speed   | 0.0                                      |
//! | rainfall     | `rain.1h`, else `rain.3h / 3`, else 0.0  |
//! | description  | `"unknown"`                              |
//! | observed at  | `dt`, else when the payload was received |

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::NormalizationError;
use crate::provider::RawPayload;
use crate::types::{
    DailyForecast, Horizon, NormalizedForecast, NormalizedWeather, PROVIDER_ID,
};

const UNKNOWN_DESCRIPTION: &str = "unknown";

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    coord: Coord,
    main: CurrentMain,
    wind: Option<Wind>,
    rain: Option<Rain>,
    #[serde(default)]
    weather: Vec<Condition>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Coord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentMain {
    temp: f64,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Rain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastSample>,
    city: Option<City>,
}

#[derive(Debug, Deserialize)]
struct City {
    /// Offset from UTC in seconds.
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ForecastSample {
    dt: i64,
    main: SampleMain,
    rain: Option<Rain>,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct SampleMain {
    temp: f64,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<f64>,
}

pub fn normalize_current(raw: &RawPayload) -> Result<NormalizedWeather, NormalizationError> {
    let parsed = CurrentResponse::deserialize(&raw.body).map_err(schema_error)?;

    check_range("coord.lat", parsed.coord.lat, -90.0, 90.0)?;
    check_range("coord.lon", parsed.coord.lon, -180.0, 180.0)?;
    check_finite("main.temp", parsed.main.temp)?;

    let humidity = humidity_percent(parsed.main.humidity)?;
    let wind_speed = non_negative(
        "wind.speed",
        parsed.wind.and_then(|w| w.speed).unwrap_or(0.0),
    )?;

    let rainfall = match parsed.rain {
        Some(Rain {
            one_hour: Some(mm), ..
        }) => non_negative("rain.1h", mm)?,
        Some(Rain {
            three_hours: Some(mm),
            ..
        }) => non_negative("rain.3h", mm)? / 3.0,
        _ => 0.0,
    };

    let timestamp = match parsed.dt {
        Some(dt) => timestamp("dt", dt)?,
        None => raw.received_at,
    };

    Ok(NormalizedWeather {
        temperature: parsed.main.temp,
        humidity,
        rainfall,
        wind_speed,
        description: first_description(&parsed.weather)
            .unwrap_or(UNKNOWN_DESCRIPTION)
            .to_string(),
        provider: PROVIDER_ID.to_string(),
        cached: false,
        stale: false,
        timestamp,
    })
}

/// Collapse 3-hourly samples into at most `horizon` calendar days.
///
/// Samples are bucketed by date in the location's local time (`city.timezone`,
/// UTC when absent). For each day: `temp_min` is the minimum of the samples'
/// `temp_min` (or `temp`), `temp_max` the maximum of their `temp_max` (or
/// `temp`), humidity the rounded mean, rainfall the sum of `rain.3h`, and the
/// description the most frequent one, ties going to the earliest sample.
/// Samples are ordered by `dt`, then description, before aggregation so the
/// result does not depend on the order the provider listed them in.
pub fn normalize_forecast(
    raw: &RawPayload,
    horizon: Horizon,
) -> Result<NormalizedForecast, NormalizationError> {
    let mut parsed = ForecastResponse::deserialize(&raw.body).map_err(schema_error)?;
    if parsed.list.is_empty() {
        return Err(NormalizationError::EmptyForecast);
    }

    let offset_secs = parsed.city.and_then(|c| c.timezone).unwrap_or(0);
    let offset = FixedOffset::east_opt(offset_secs).ok_or(NormalizationError::OutOfRange {
        field: "city.timezone",
        value: f64::from(offset_secs),
    })?;

    // Equal `dt` values are ordered by description so ties stay stable.
    parsed.list.sort_by(|a, b| {
        a.dt.cmp(&b.dt)
            .then_with(|| first_description(&a.weather).cmp(&first_description(&b.weather)))
    });

    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for sample in &parsed.list {
        let date = timestamp("list.dt", sample.dt)?
            .with_timezone(&offset)
            .date_naive();
        days.entry(date).or_default().add(sample)?;
    }

    let forecast = days
        .into_iter()
        .take(usize::from(horizon.days()))
        .map(|(date, day)| day.finish(date))
        .collect();

    Ok(NormalizedForecast {
        forecast,
        provider: PROVIDER_ID.to_string(),
        cached: false,
        stale: false,
        timestamp: raw.received_at,
    })
}

#[derive(Debug)]
struct DayAccumulator {
    temp_min: f64,
    temp_max: f64,
    humidity_sum: f64,
    humidity_samples: u32,
    rainfall: f64,
    /// (description, occurrences) in first-seen order.
    descriptions: Vec<(String, u32)>,
}

impl Default for DayAccumulator {
    fn default() -> Self {
        Self {
            temp_min: f64::INFINITY,
            temp_max: f64::NEG_INFINITY,
            humidity_sum: 0.0,
            humidity_samples: 0,
            rainfall: 0.0,
            descriptions: Vec::new(),
        }
    }
}

impl DayAccumulator {
    fn add(&mut self, sample: &ForecastSample) -> Result<(), NormalizationError> {
        let main = &sample.main;
        check_finite("main.temp", main.temp)?;
        let low = main.temp_min.unwrap_or(main.temp);
        let high = main.temp_max.unwrap_or(main.temp);
        check_finite("main.temp_min", low)?;
        check_finite("main.temp_max", high)?;

        self.temp_min = self.temp_min.min(low);
        self.temp_max = self.temp_max.max(high);

        if let Some(humidity) = main.humidity {
            check_range("main.humidity", humidity, 0.0, 100.0)?;
            self.humidity_sum += humidity;
            self.humidity_samples += 1;
        }

        if let Some(mm) = sample.rain.as_ref().and_then(|r| r.three_hours) {
            self.rainfall += non_negative("rain.3h", mm)?;
        }

        if let Some(description) = first_description(&sample.weather) {
            match self
                .descriptions
                .iter_mut()
                .find(|(seen, _)| seen == description)
            {
                Some((_, count)) => *count += 1,
                None => self.descriptions.push((description.to_string(), 1)),
            }
        }

        Ok(())
    }

    fn finish(self, date: NaiveDate) -> DailyForecast {
        let humidity = if self.humidity_samples == 0 {
            0
        } else {
            (self.humidity_sum / f64::from(self.humidity_samples)).round() as u8
        };

        let mut description: Option<(String, u32)> = None;
        for (text, count) in self.descriptions {
            if description.as_ref().map_or(true, |(_, best)| count > *best) {
                description = Some((text, count));
            }
        }

        DailyForecast {
            date,
            temp_min: self.temp_min,
            temp_max: self.temp_max,
            humidity,
            rainfall: self.rainfall,
            description: description
                .map(|(text, _)| text)
                .unwrap_or_else(|| UNKNOWN_DESCRIPTION.to_string()),
        }
    }
}

fn schema_error(e: serde_json::Error) -> NormalizationError {
    NormalizationError::Schema(e.to_string())
}

fn first_description(conditions: &[Condition]) -> Option<&str> {
    conditions.first().and_then(|c| c.description.as_deref())
}

fn check_finite(field: &'static str, value: f64) -> Result<(), NormalizationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NormalizationError::OutOfRange { field, value })
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), NormalizationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(NormalizationError::OutOfRange { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, NormalizationError> {
    check_range(field, value, 0.0, f64::MAX)?;
    Ok(value)
}

fn humidity_percent(value: Option<f64>) -> Result<u8, NormalizationError> {
    match value {
        Some(h) => {
            check_range("main.humidity", h, 0.0, 100.0)?;
            Ok(h.round() as u8)
        }
        None => Ok(0),
    }
}

fn timestamp(field: &'static str, unix_secs: i64) -> Result<DateTime<Utc>, NormalizationError> {
    DateTime::from_timestamp(unix_secs, 0).ok_or(NormalizationError::OutOfRange {
        field,
        value: unix_secs as f64,
    })
}
