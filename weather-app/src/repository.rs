use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Utc};
use thiserror::Error;

use crate::model::{CurrentWeather, DayForecast};

pub mod openweather;

/// Errors raised by the data-fetch collaborators.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The backend knows nothing about the requested place.
    #[error("no weather available for {place}")]
    PlaceNotFound { place: String },

    /// The request itself failed (network, decoding, backend fault).
    #[error("weather request for {place} failed")]
    Request {
        place: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WeatherError {
    /// The place key the failing fetch was for.
    pub fn place(&self) -> &str {
        match self {
            WeatherError::PlaceNotFound { place } | WeatherError::Request { place, .. } => place,
        }
    }
}

/// Narrow fetch contract the screen controllers call through.
///
/// Implementations may be slow and may fail; callers treat them as opaque.
#[async_trait(?Send)]
pub trait WeatherRepository {
    async fn fetch_current_weather(&self, place: &str) -> Result<CurrentWeather, WeatherError>;
    async fn fetch_forecast(&self, place: &str) -> Result<Vec<DayForecast>, WeatherError>;
}

/// Offline collaborator: canned answers behind a configurable delay standing
/// in for a slow network connection.
pub struct SimulatedRepository {
    latency: Duration,
    places: HashMap<String, CurrentWeather>,
    forecasts: HashMap<String, Vec<DayForecast>>,
}

impl SimulatedRepository {
    pub fn new(latency: Duration) -> Self {
        let mut places = HashMap::new();
        for (key, name, description, temperature_c) in [
            ("London,uk", "London", "light rain", 11.0),
            ("Venice,it", "Venice", "sunny", 22.5),
            ("New York,us", "New York", "scattered clouds", 17.3),
        ] {
            places.insert(
                key.to_string(),
                CurrentWeather {
                    place_name: name.to_string(),
                    description: description.to_string(),
                    temperature_c,
                    icon: None,
                },
            );
        }

        let forecasts = places
            .iter()
            .map(|(key, weather)| (key.clone(), canned_forecast(weather)))
            .collect();

        Self {
            latency,
            places,
            forecasts,
        }
    }
}

fn canned_forecast(weather: &CurrentWeather) -> Vec<DayForecast> {
    let today = Utc::now().date_naive();
    (0..5u64)
        .map(|offset| DayForecast {
            date: today + Days::new(offset),
            description: weather.description.clone(),
            min_temperature_c: weather.temperature_c - 3.0,
            max_temperature_c: weather.temperature_c + 2.0,
            icon: None,
        })
        .collect()
}

#[async_trait(?Send)]
impl WeatherRepository for SimulatedRepository {
    async fn fetch_current_weather(&self, place: &str) -> Result<CurrentWeather, WeatherError> {
        tokio::time::sleep(self.latency).await;
        self.places.get(place).cloned().ok_or_else(|| WeatherError::PlaceNotFound {
            place: place.to_string(),
        })
    }

    async fn fetch_forecast(&self, place: &str) -> Result<Vec<DayForecast>, WeatherError> {
        tokio::time::sleep(self.latency).await;
        if !self.places.contains_key(place) {
            return Err(WeatherError::PlaceNotFound {
                place: place.to_string(),
            });
        }
        Ok(self.forecasts.get(place).cloned().unwrap_or_default())
    }
}
