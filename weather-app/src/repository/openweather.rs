use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{WeatherError, WeatherRepository};
use crate::model::{CurrentWeather, DayForecast};

const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// Live collaborator backed by the OpenWeather HTTP API.
#[derive(Debug, Clone)]
pub struct OpenWeatherRepository {
    api_key: String,
    http: Client,
}

impl OpenWeatherRepository {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }

    async fn get_body(&self, url: &str, place: &str) -> Result<String, WeatherError> {
        let response = self
            .http
            .get(url)
            .query(&[
                ("q", place),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|err| request_error(place, err, "sending the request failed"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| request_error(place, err, "reading the response body failed"))?;

        if status == StatusCode::NOT_FOUND {
            return Err(WeatherError::PlaceNotFound {
                place: place.to_string(),
            });
        }
        if !status.is_success() {
            return Err(WeatherError::Request {
                place: place.to_string(),
                source: anyhow!("OpenWeather returned status {}: {}", status, truncate_body(&body)),
            });
        }

        Ok(body)
    }
}

fn request_error(
    place: &str,
    err: impl std::error::Error + Send + Sync + 'static,
    context: &'static str,
) -> WeatherError {
    WeatherError::Request {
        place: place.to_string(),
        source: anyhow::Error::new(err).context(context),
    }
}

#[async_trait(?Send)]
impl WeatherRepository for OpenWeatherRepository {
    async fn fetch_current_weather(&self, place: &str) -> Result<CurrentWeather, WeatherError> {
        let body = self.get_body(CURRENT_URL, place).await?;
        let parsed: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|err| request_error(place, err, "parsing the current-weather JSON failed"))?;

        let description = parsed
            .weather
            .first()
            .map(|entry| entry.description.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let icon = parsed.weather.first().and_then(|entry| entry.icon.clone());

        Ok(CurrentWeather {
            place_name: parsed.name,
            description,
            temperature_c: parsed.main.temp,
            icon,
        })
    }

    async fn fetch_forecast(&self, place: &str) -> Result<Vec<DayForecast>, WeatherError> {
        let body = self.get_body(FORECAST_URL, place).await?;
        let parsed: OwForecastResponse = serde_json::from_str(&body)
            .map_err(|err| request_error(place, err, "parsing the forecast JSON failed"))?;

        Ok(bucket_by_day(&parsed.list))
    }
}

/// Collapses the 3-hourly forecast entries into one record per calendar day,
/// keeping each day's temperature extremes and first reported condition.
fn bucket_by_day(entries: &[OwForecastEntry]) -> Vec<DayForecast> {
    let mut days: Vec<DayForecast> = Vec::new();

    for entry in entries {
        let Some(timestamp) = DateTime::<Utc>::from_timestamp(entry.dt, 0) else {
            continue;
        };
        let date = timestamp.date_naive();

        match days.last_mut() {
            Some(day) if day.date == date => {
                day.min_temperature_c = day.min_temperature_c.min(entry.main.temp_min);
                day.max_temperature_c = day.max_temperature_c.max(entry.main.temp_max);
            }
            _ => days.push(DayForecast {
                date,
                description: entry
                    .weather
                    .first()
                    .map(|condition| condition.description.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                min_temperature_c: entry.main.temp_min,
                max_temperature_c: entry.main.temp_max,
                icon: entry.weather.first().and_then(|condition| condition.icon.clone()),
            }),
        }
    }

    days
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        let truncated: String = body.chars().take(MAX).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwCurrentMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}
