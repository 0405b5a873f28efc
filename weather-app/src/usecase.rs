use std::rc::Rc;

use futures::future::join_all;
use presenter_core::{TaskContext, TaskResult};

use crate::model::{CurrentWeather, DayForecast, Place};
use crate::repository::WeatherRepository;

/// Retrieves the current weather for one place.
pub struct GetWeatherUseCase {
    repository: Rc<dyn WeatherRepository>,
}

impl GetWeatherUseCase {
    pub fn new(repository: Rc<dyn WeatherRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, cx: &TaskContext, place: &Place) -> TaskResult<CurrentWeather> {
        cx.cancellable_try(self.repository.fetch_current_weather(&place.key())).await
    }
}

/// Fans out one independent fetch per place and averages the temperatures.
/// Places with no data contribute 0.0 instead of failing the computation.
pub struct GetAverageTemperatureUseCase {
    repository: Rc<dyn WeatherRepository>,
}

impl GetAverageTemperatureUseCase {
    pub fn new(repository: Rc<dyn WeatherRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, cx: &TaskContext, places: &[Place]) -> TaskResult<f64> {
        let keys: Vec<String> = places.iter().map(Place::key).collect();
        let fetches = keys.iter().map(|key| self.repository.fetch_current_weather(key));
        let results = cx.cancellable(join_all(fetches)).await?;

        if results.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = results
            .iter()
            .map(|result| result.as_ref().map_or(0.0, |weather| weather.temperature_c))
            .sum();
        Ok(total / results.len() as f64)
    }
}

/// Retrieves the multi-day forecast for one place.
pub struct GetForecastUseCase {
    repository: Rc<dyn WeatherRepository>,
}

impl GetForecastUseCase {
    pub fn new(repository: Rc<dyn WeatherRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, cx: &TaskContext, place: &Place) -> TaskResult<Vec<DayForecast>> {
        cx.cancellable_try(self.repository.fetch_forecast(&place.key())).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use presenter_core::TaskError;

    use super::*;
    use crate::repository::{SimulatedRepository, WeatherError};

    fn context() -> TaskContext {
        TaskContext::standalone()
    }

    #[tokio::test]
    async fn average_spans_all_places() {
        let repository = Rc::new(SimulatedRepository::new(Duration::ZERO));
        let use_case = GetAverageTemperatureUseCase::new(repository);
        let places = vec![
            Place::new("London", "uk"),
            Place::new("Venice", "it"),
            Place::new("New York", "us"),
        ];

        let average = use_case.execute(&context(), &places).await.expect("should average");

        let expected = (11.0 + 22.5 + 17.3) / 3.0;
        assert!((average - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_places_count_as_zero_in_the_average() {
        let repository = Rc::new(SimulatedRepository::new(Duration::ZERO));
        let use_case = GetAverageTemperatureUseCase::new(repository);
        let places = vec![Place::new("Venice", "it"), Place::new("Atlantis", "xx")];

        let average = use_case.execute(&context(), &places).await.expect("should average");

        assert!((average - 22.5 / 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fetch_errors_keep_their_domain_payload() {
        let repository = Rc::new(SimulatedRepository::new(Duration::ZERO));
        let use_case = GetWeatherUseCase::new(repository);

        let err = use_case
            .execute(&context(), &Place::new("Atlantis", "xx"))
            .await
            .expect_err("place should be unknown");

        match err.downcast_ref::<WeatherError>() {
            Some(WeatherError::PlaceNotFound { place }) => assert_eq!(place, "Atlantis,xx"),
            other => panic!("expected PlaceNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_slow_fetch() {
        let repository = Rc::new(SimulatedRepository::new(Duration::from_secs(3600)));
        let use_case = GetWeatherUseCase::new(repository);
        let cx = context();
        cx.handle().cancel();

        let err = use_case
            .execute(&cx, &Place::new("Venice", "it"))
            .await
            .expect_err("should observe cancellation");

        assert!(matches!(err, TaskError::Cancelled));
    }
}
