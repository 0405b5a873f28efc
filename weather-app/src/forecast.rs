use std::cell::RefCell;
use std::rc::{Rc, Weak};

use presenter_core::{Presenter, StickyDecision};
use tracing::debug;

use crate::home::RetryChoice;
use crate::model::{DayForecast, Place};
use crate::repository::{WeatherError, WeatherRepository};
use crate::usecase::GetForecastUseCase;

/// Capabilities the forecast screen controller needs from its surface.
pub trait ForecastSurface {
    fn display_loading_state(&self);
    fn display_content_state(&self);
    fn display_no_data_state(&self);
    fn display_error_state(&self);
    fn update_forecasts(&self, forecasts: &[DayForecast]);
    fn prompt_retry(&self, place: &str, decision: StickyDecision<RetryChoice>);
}

/// Screen controller for the multi-day forecast of a single place.
pub struct ForecastController {
    this: Weak<ForecastController>,
    presenter: Rc<Presenter<dyn ForecastSurface>>,
    get_forecast: GetForecastUseCase,
    forecasts: RefCell<Vec<DayForecast>>,
}

impl ForecastController {
    pub fn new(repository: Rc<dyn WeatherRepository>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            presenter: Rc::new(Presenter::new()),
            get_forecast: GetForecastUseCase::new(repository),
            forecasts: RefCell::new(Vec::new()),
        })
    }

    /// The presenter, for hosts to attach surfaces and deliver lifecycle
    /// phases.
    pub fn presenter(&self) -> &Rc<Presenter<dyn ForecastSurface>> {
        &self.presenter
    }

    pub fn forecasts(&self) -> Vec<DayForecast> {
        self.forecasts.borrow().clone()
    }

    /// Loads the forecast for `place`; a failure clears the list, shows the
    /// error state and offers a retry of the same place.
    pub fn load_forecasts(&self, place: Place) {
        debug!(place = %place.key(), "loading forecast");
        let Some(this) = self.this.upgrade() else { return };
        let on_error = Rc::clone(&this);
        let requested = place.clone();
        self.presenter.launch_try_catch(
            move |cx| async move {
                let surface = this.presenter.surface(&cx).await?;
                surface.display_loading_state();

                let forecasts = this.get_forecast.execute(&cx, &place).await?;

                let surface = this.presenter.surface(&cx).await?;
                surface.update_forecasts(&forecasts);
                let empty = forecasts.is_empty();
                *this.forecasts.borrow_mut() = forecasts;
                if empty {
                    surface.display_no_data_state();
                } else {
                    surface.display_content_state();
                }
                Ok(())
            },
            move |cx, error| async move {
                on_error.forecasts.borrow_mut().clear();

                let surface = on_error.presenter.surface(&cx).await?;
                surface.update_forecasts(&[]);
                surface.display_error_state();

                let place_key = match error.downcast_ref::<WeatherError>() {
                    Some(domain) => domain.place().to_string(),
                    None => requested.key(),
                };
                let choice = on_error
                    .presenter
                    .sticky_suspension(&cx, move |surface, decision| {
                        surface.prompt_retry(&place_key, decision);
                    })
                    .await?;

                if choice == RetryChoice::Retry {
                    on_error.load_forecasts(requested);
                }
                Ok(())
            },
            false,
        );
    }

    /// Cancels every outstanding workflow. Call once when the screen goes
    /// away for good.
    pub fn cleanup(&self) {
        self.presenter.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use async_trait::async_trait;
    use presenter_core::LifecycleState;
    use tokio::task::LocalSet;

    use super::*;
    use crate::model::CurrentWeather;
    use crate::repository::SimulatedRepository;

    #[derive(Default)]
    struct TestSurface {
        states: RefCell<Vec<String>>,
        updates: RefCell<Vec<usize>>,
        prompts: RefCell<Vec<String>>,
        auto_choice: Cell<Option<RetryChoice>>,
    }

    impl ForecastSurface for TestSurface {
        fn display_loading_state(&self) {
            self.states.borrow_mut().push("loading".to_string());
        }

        fn display_content_state(&self) {
            self.states.borrow_mut().push("content".to_string());
        }

        fn display_no_data_state(&self) {
            self.states.borrow_mut().push("no-data".to_string());
        }

        fn display_error_state(&self) {
            self.states.borrow_mut().push("error".to_string());
        }

        fn update_forecasts(&self, forecasts: &[DayForecast]) {
            self.updates.borrow_mut().push(forecasts.len());
        }

        fn prompt_retry(&self, place: &str, decision: StickyDecision<RetryChoice>) {
            self.prompts.borrow_mut().push(place.to_string());
            if let Some(choice) = self.auto_choice.get() {
                decision.resume(choice);
            }
        }
    }

    /// Fails the first fetch, succeeds afterwards.
    struct FlakyRepository {
        inner: SimulatedRepository,
        attempts: Cell<u32>,
    }

    impl FlakyRepository {
        fn new() -> Self {
            Self {
                inner: SimulatedRepository::new(Duration::ZERO),
                attempts: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl WeatherRepository for FlakyRepository {
        async fn fetch_current_weather(&self, place: &str) -> Result<CurrentWeather, WeatherError> {
            self.inner.fetch_current_weather(place).await
        }

        async fn fetch_forecast(&self, place: &str) -> Result<Vec<DayForecast>, WeatherError> {
            let attempt = self.attempts.get();
            self.attempts.set(attempt + 1);
            if attempt == 0 {
                return Err(WeatherError::PlaceNotFound {
                    place: place.to_string(),
                });
            }
            self.inner.fetch_forecast(place).await
        }
    }

    fn setup(repository: Rc<dyn WeatherRepository>) -> (Rc<ForecastController>, Rc<TestSurface>) {
        let controller = ForecastController::new(repository);
        let surface = Rc::new(TestSurface::default());
        controller
            .presenter()
            .attach_surface(Rc::clone(&surface) as Rc<dyn ForecastSurface>);
        controller.presenter().notify_lifecycle_changed(LifecycleState::Resumed);
        (controller, surface)
    }

    async fn drain() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_load_reaches_the_content_state() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let repository = Rc::new(SimulatedRepository::new(Duration::ZERO));
                let (controller, surface) = setup(repository);

                controller.load_forecasts(Place::new("Venice", "it"));
                drain().await;

                assert_eq!(controller.forecasts().len(), 5);
                assert_eq!(*surface.states.borrow(), ["loading", "content"]);
                assert_eq!(*surface.updates.borrow(), [5usize]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_forecast_reaches_the_no_data_state() {
        struct EmptyRepository;

        #[async_trait(?Send)]
        impl WeatherRepository for EmptyRepository {
            async fn fetch_current_weather(
                &self,
                place: &str,
            ) -> Result<CurrentWeather, WeatherError> {
                Err(WeatherError::PlaceNotFound {
                    place: place.to_string(),
                })
            }

            async fn fetch_forecast(&self, _place: &str) -> Result<Vec<DayForecast>, WeatherError> {
                Ok(Vec::new())
            }
        }

        let local = LocalSet::new();
        local
            .run_until(async {
                let (controller, surface) = setup(Rc::new(EmptyRepository));

                controller.load_forecasts(Place::new("Venice", "it"));
                drain().await;

                assert!(controller.forecasts().is_empty());
                assert_eq!(*surface.states.borrow(), ["loading", "no-data"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_a_failure_loads_the_forecast() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (controller, surface) = setup(Rc::new(FlakyRepository::new()));
                surface.auto_choice.set(Some(RetryChoice::Retry));

                controller.load_forecasts(Place::new("Venice", "it"));
                drain().await;

                assert_eq!(*surface.prompts.borrow(), ["Venice,it"]);
                assert_eq!(controller.forecasts().len(), 5);
                assert_eq!(
                    *surface.states.borrow(),
                    ["loading", "error", "loading", "content"]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_retry_leaves_the_error_state() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (controller, surface) = setup(Rc::new(FlakyRepository::new()));
                surface.auto_choice.set(Some(RetryChoice::Cancel));

                controller.load_forecasts(Place::new("Venice", "it"));
                drain().await;

                assert!(controller.forecasts().is_empty());
                assert_eq!(*surface.states.borrow(), ["loading", "error"]);
                assert!(controller.presenter().is_idle());
            })
            .await;
    }
}
