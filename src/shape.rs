//! Turns the two upstream payloads into a display-ready [`WeatherRecord`]

use chrono::DateTime;
use serde_json::{Number, Value};

use crate::models::{Location, WeatherRecord};
use crate::openweather::payload::{AirPollution, CurrentWeather};
use crate::openweather::FetchError;

const KMH_PER_MS: f64 = 3.6;
const METERS_PER_KM: f64 = 1000.0;

/// Shape one record. Missing numeric readings default to zero; a payload
/// without conditions, sun times or an AQI is malformed.
pub fn shape_record(
    location: &Location,
    weather: &CurrentWeather,
    pollution: &AirPollution,
    icon_base_url: &str,
    last_updated: &str,
) -> Result<WeatherRecord, FetchError> {
    let main = weather
        .main
        .as_ref()
        .ok_or_else(|| FetchError::Malformed("weather payload has no main section".into()))?;
    let condition = weather
        .weather
        .first()
        .ok_or_else(|| FetchError::Malformed("weather payload has no conditions".into()))?;
    let sys = weather
        .sys
        .as_ref()
        .ok_or_else(|| FetchError::Malformed("weather payload has no sys section".into()))?;
    let sample = pollution
        .first_sample()
        .ok_or_else(|| FetchError::Malformed("pollution payload has no readings".into()))?;
    let aqi = sample
        .main
        .as_ref()
        .ok_or_else(|| FetchError::Malformed("pollution reading has no AQI".into()))?
        .aqi;

    let offset = weather.timezone.unwrap_or_default();
    let sunrise = sys
        .sunrise
        .ok_or_else(|| FetchError::Malformed("missing sunrise".into()))?;
    let sunset = sys
        .sunset
        .ok_or_else(|| FetchError::Malformed("missing sunset".into()))?;

    let wind_speed = weather.wind.as_ref().and_then(|w| w.speed).unwrap_or(0.0);
    let wind_degree = weather.wind.as_ref().and_then(|w| w.deg.as_ref());
    let clouds = weather.clouds.as_ref().and_then(|c| c.all.as_ref());
    let component = |name: &str| component_text(sample.components.get(name));

    Ok(WeatherRecord {
        latitude: location.latitude,
        longitude: location.longitude,
        city: location.name.clone(),
        weather: title_case(&condition.description),
        weather_icon: format!(
            "{}/{}@2x.png",
            icon_base_url.trim_end_matches('/'),
            condition.icon
        ),
        temperature: format!("{}°C", temperature_text(main.temp.as_ref())),
        pressure: format!("{} hPa", number_text(main.pressure.as_ref())),
        humidity: format!("{}%", number_text(main.humidity.as_ref())),
        visibility: format!(
            "{} km",
            decimal_text(weather.visibility.unwrap_or(0.0) / METERS_PER_KM)
        ),
        wind_speed: format!("{} km/h", decimal_text(wind_speed * KMH_PER_MS)),
        wind_degree: format!("{}°", number_text(wind_degree)),
        cloud_coverage: format!("{}%", number_text(clouds)),
        sunrise: clock_time(local_epoch(sunrise, offset)?)?,
        sunset: clock_time(local_epoch(sunset, offset)?)?,
        aqi,
        co: component("co"),
        no: component("no"),
        no2: component("no2"),
        o3: component("o3"),
        so2: component("so2"),
        pm2_5: component("pm2_5"),
        pm10: component("pm10"),
        nh3: component("nh3"),
        last_updated: last_updated.to_string(),
    })
}

/// Upper-case the first letter of every word, lower-case the rest
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// Two decimal places, rounding the exact binary value and sending exact
/// ties to the even neighbour: `3.125` becomes `3.12`, `3.135` (stored as
/// `3.13499..`) becomes `3.13`.
#[must_use]
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if (scaled - scaled.trunc()).abs() != 0.5 {
        return scaled.round() / 100.0;
    }
    // `scaled` may itself be a rounded product; the residual tells which side
    // of the tie the exact product sits on.
    let residual = value.mul_add(100.0, -scaled);
    let rounded = if residual > 0.0 {
        scaled.ceil()
    } else if residual < 0.0 {
        scaled.floor()
    } else {
        scaled.round_ties_even()
    };
    rounded / 100.0
}

/// Rounded to two places, always with a fractional part: `36.0`, `18.36`
#[must_use]
pub fn decimal_text(value: f64) -> String {
    let rounded = round2(value);
    if rounded.is_finite() && rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}

/// Integral readings pass through untouched, fractional ones are rounded
fn temperature_text(value: Option<&Number>) -> String {
    match value {
        None => "0".to_string(),
        Some(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(n) => decimal_text(n.as_f64().unwrap_or_default()),
    }
}

fn number_text(value: Option<&Number>) -> String {
    value.map_or_else(|| "0".to_string(), Number::to_string)
}

fn component_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "0".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn local_epoch(epoch: i64, offset: i64) -> Result<i64, FetchError> {
    epoch
        .checked_add(offset)
        .ok_or_else(|| FetchError::Malformed(format!("timestamp {epoch} out of range")))
}

/// Local wall-clock time as `06:05 AM`
fn clock_time(local_epoch: i64) -> Result<String, FetchError> {
    DateTime::from_timestamp(local_epoch, 0)
        .map(|t| t.format("%I:%M %p").to_string())
        .ok_or_else(|| FetchError::Malformed(format!("timestamp {local_epoch} out of range")))
}
