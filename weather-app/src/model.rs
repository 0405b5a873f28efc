use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A place whose weather the demo screens display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub name: String,
    pub country: String,
}

impl Place {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
        }
    }

    /// Key used by the fetch collaborators, e.g. `"Venice,it"`.
    pub fn key(&self) -> String {
        format!("{},{}", self.name, self.country)
    }
}

/// Weather for one place as last retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub place_name: String,
    pub description: String,
    pub temperature_c: f64,
    pub icon: Option<String>,
}

/// Display state of one place slot on the home screen.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaceWeather {
    /// Nothing known for the slot; also the terminal state after the user
    /// cancels a retry.
    #[default]
    Unknown,
    Loading,
    Loaded(CurrentWeather),
    Failed,
}

/// One day bucket of a multi-day forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub description: String,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
    pub icon: Option<String>,
}
