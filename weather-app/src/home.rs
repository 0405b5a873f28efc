use std::cell::RefCell;
use std::rc::{Rc, Weak};

use presenter_core::{Presenter, StickyDecision, TaskContext, TaskError, TaskResult};
use tracing::debug;

use crate::model::{Place, PlaceWeather};
use crate::repository::{WeatherError, WeatherRepository};
use crate::usecase::{GetAverageTemperatureUseCase, GetWeatherUseCase};

/// Outcome of the retry/cancel dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryChoice {
    Retry,
    Cancel,
}

/// Capabilities the home screen controller needs from its surface.
pub trait HomeSurface {
    fn clear_all_places(&self, count: usize);
    fn update_place(&self, index: usize, weather: &PlaceWeather);
    fn display_average_temperature(&self, average_c: f64);
    /// Non-modal error notice for `place`.
    fn display_retrieval_error(&self, place: &str);
    fn display_generic_error(&self);
    /// Modal retry/cancel dialog for `place`; the surface resolves
    /// `decision` once the user picks.
    fn prompt_retry(&self, place: &str, decision: StickyDecision<RetryChoice>);
}

/// Screen controller for the home screen: one weather slot per place, with
/// sequential, parallel, retrying and averaging load workflows.
pub struct HomeController {
    this: Weak<HomeController>,
    presenter: Rc<Presenter<dyn HomeSurface>>,
    get_weather: GetWeatherUseCase,
    get_average: GetAverageTemperatureUseCase,
    places: Vec<Place>,
    weather: RefCell<Vec<PlaceWeather>>,
}

impl HomeController {
    pub fn new(repository: Rc<dyn WeatherRepository>, places: Vec<Place>) -> Rc<Self> {
        let slots = places.len();
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            presenter: Rc::new(Presenter::new()),
            get_weather: GetWeatherUseCase::new(Rc::clone(&repository)),
            get_average: GetAverageTemperatureUseCase::new(repository),
            places,
            weather: RefCell::new(vec![PlaceWeather::Unknown; slots]),
        })
    }

    /// Strong handle on this controller, for moving into launched workflows.
    fn this(&self) -> Option<Rc<Self>> {
        self.this.upgrade()
    }

    /// The presenter, for hosts to attach surfaces and deliver lifecycle
    /// phases.
    pub fn presenter(&self) -> &Rc<Presenter<dyn HomeSurface>> {
        &self.presenter
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// Current display state of one slot.
    pub fn place_weather(&self, index: usize) -> PlaceWeather {
        self.weather.borrow().get(index).cloned().unwrap_or_default()
    }

    fn set_place_weather(&self, index: usize, weather: PlaceWeather) {
        if let Some(slot) = self.weather.borrow_mut().get_mut(index) {
            *slot = weather;
        }
    }

    async fn render_place(
        &self,
        cx: &TaskContext,
        index: usize,
        weather: PlaceWeather,
    ) -> TaskResult<()> {
        let surface = self.presenter.surface(cx).await?;
        surface.update_place(index, &weather);
        self.set_place_weather(index, weather);
        Ok(())
    }

    async fn clear_all(&self, cx: &TaskContext) -> TaskResult<()> {
        let surface = self.presenter.surface(cx).await?;
        let count = self.places.len();
        *self.weather.borrow_mut() = vec![PlaceWeather::Unknown; count];
        surface.clear_all_places(count);
        Ok(())
    }

    async fn load_place(&self, cx: &TaskContext, index: usize) -> TaskResult<()> {
        debug!(index, "loading weather");
        self.render_place(cx, index, PlaceWeather::Loading).await?;
        let weather = self.get_weather.execute(cx, &self.places[index]).await?;
        self.render_place(cx, index, PlaceWeather::Loaded(weather)).await
    }

    async fn report_error(&self, cx: &TaskContext, error: &TaskError) -> TaskResult<()> {
        let surface = self.presenter.surface(cx).await?;
        match error.downcast_ref::<WeatherError>() {
            Some(WeatherError::PlaceNotFound { place }) => surface.display_retrieval_error(place),
            _ => surface.display_generic_error(),
        }
        Ok(())
    }

    /// Loads every place one after the other; a single failure stops the run
    /// and is reported once.
    pub fn load_sequential(&self) {
        let Some(this) = self.this() else { return };
        let on_error = Rc::clone(&this);
        self.presenter.launch_try_catch(
            move |cx| async move {
                this.clear_all(&cx).await?;
                for index in 0..this.places.len() {
                    this.load_place(&cx, index).await?;
                }
                Ok(())
            },
            move |cx, error| async move { on_error.report_error(&cx, &error).await },
            false,
        );
    }

    /// Loads every place concurrently; each slot succeeds or fails on its
    /// own without disturbing the others.
    pub fn load_parallel(&self) {
        let Some(this) = self.this() else { return };
        self.presenter.launch(move |cx| async move { this.clear_all(&cx).await });

        for index in 0..self.places.len() {
            let Some(this) = self.this() else { return };
            let on_error = Rc::clone(&this);
            self.presenter.launch_try_catch(
                move |cx| async move { this.load_place(&cx, index).await },
                move |cx, error| async move {
                    on_error.render_place(&cx, index, PlaceWeather::Failed).await?;
                    on_error.report_error(&cx, &error).await
                },
                false,
            );
        }
    }

    /// Demonstrates retry-with-dialog: starts slot 0 from a misspelled place
    /// key, offers retry on the resulting domain error, and recurses with
    /// the corrected place when the user retries.
    pub fn load_with_retry(&self) {
        let Some(this) = self.this() else { return };
        self.presenter.launch(move |cx| async move {
            this.clear_all(&cx).await?;
            let Some(first) = this.places.first() else {
                return Ok(());
            };
            let misspelled = Place::new(format!("{}Wrong", first.name), first.country.clone());
            this.load_place_with_retry(misspelled);
            Ok(())
        });
    }

    fn load_place_with_retry(&self, place: Place) {
        let Some(this) = self.this() else { return };
        let on_error = Rc::clone(&this);
        self.presenter.launch_try_catch(
            move |cx| async move {
                this.render_place(&cx, 0, PlaceWeather::Loading).await?;
                let weather = this.get_weather.execute(&cx, &place).await?;
                this.render_place(&cx, 0, PlaceWeather::Loaded(weather)).await
            },
            move |cx, error| async move {
                let Some(WeatherError::PlaceNotFound { place }) =
                    error.downcast_ref::<WeatherError>()
                else {
                    let surface = on_error.presenter.surface(&cx).await?;
                    surface.display_generic_error();
                    return Ok(());
                };

                let place = place.clone();
                let choice = on_error
                    .presenter
                    .sticky_suspension(&cx, move |surface, decision| {
                        surface.prompt_retry(&place, decision);
                    })
                    .await?;

                match choice {
                    RetryChoice::Retry => {
                        if let Some(corrected) = on_error.places.first().cloned() {
                            on_error.load_place_with_retry(corrected);
                        }
                    }
                    RetryChoice::Cancel => {
                        on_error.render_place(&cx, 0, PlaceWeather::Unknown).await?;
                    }
                }
                Ok(())
            },
            false,
        );
    }

    /// Fans out fetches for all places and shows the average temperature.
    pub fn load_average_temperature(&self) {
        let Some(this) = self.this() else { return };
        self.presenter.launch(move |cx| async move {
            this.clear_all(&cx).await?;
            let average = this.get_average.execute(&cx, &this.places).await?;
            let surface = this.presenter.surface(&cx).await?;
            surface.display_average_temperature(average);
            Ok(())
        });
    }

    /// Cancels every outstanding workflow. Call once when the screen goes
    /// away for good.
    pub fn cleanup(&self) {
        self.presenter.cleanup();
    }
}
