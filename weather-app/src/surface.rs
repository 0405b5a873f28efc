use std::rc::Rc;

use presenter_core::StickyDecision;
use tokio::sync::mpsc;

use crate::forecast::ForecastSurface;
use crate::home::{HomeSurface, RetryChoice};
use crate::model::{DayForecast, PlaceWeather};

/// A modal decision forwarded to the host loop, so prompting the operator
/// never blocks a workflow task mid-render.
pub enum UiRequest {
    RetryPrompt {
        place: String,
        decision: StickyDecision<RetryChoice>,
    },
}

/// Renders screen states as terminal lines and forwards modal decisions to
/// the host loop.
pub struct TerminalSurface {
    requests: mpsc::UnboundedSender<UiRequest>,
}

impl TerminalSurface {
    pub fn new() -> (Rc<Self>, mpsc::UnboundedReceiver<UiRequest>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        (Rc::new(Self { requests }), receiver)
    }

    fn forward_retry_prompt(&self, place: &str, decision: StickyDecision<RetryChoice>) {
        let _ = self.requests.send(UiRequest::RetryPrompt {
            place: place.to_string(),
            decision,
        });
    }
}

impl HomeSurface for TerminalSurface {
    fn clear_all_places(&self, count: usize) {
        println!("-- {count} places --");
    }

    fn update_place(&self, index: usize, weather: &PlaceWeather) {
        match weather {
            PlaceWeather::Unknown => println!("[{index}] -"),
            PlaceWeather::Loading => println!("[{index}] loading..."),
            PlaceWeather::Loaded(loaded) => println!(
                "[{index}] {}: {}, {:.1} C",
                loaded.place_name, loaded.description, loaded.temperature_c
            ),
            PlaceWeather::Failed => println!("[{index}] unavailable"),
        }
    }

    fn display_average_temperature(&self, average_c: f64) {
        println!("Average temperature: {average_c:.1} C");
    }

    fn display_retrieval_error(&self, place: &str) {
        println!("Could not retrieve the weather for {place}.");
    }

    fn display_generic_error(&self) {
        println!("Something went wrong while retrieving the weather.");
    }

    fn prompt_retry(&self, place: &str, decision: StickyDecision<RetryChoice>) {
        self.forward_retry_prompt(place, decision);
    }
}

impl ForecastSurface for TerminalSurface {
    fn display_loading_state(&self) {
        println!("Loading forecast...");
    }

    fn display_content_state(&self) {}

    fn display_no_data_state(&self) {
        println!("No forecast data available.");
    }

    fn display_error_state(&self) {
        println!("The forecast could not be loaded.");
    }

    fn update_forecasts(&self, forecasts: &[DayForecast]) {
        for day in forecasts {
            println!(
                "{} {}: {:.1} to {:.1} C",
                day.date, day.description, day.min_temperature_c, day.max_temperature_c
            );
        }
    }

    fn prompt_retry(&self, place: &str, decision: StickyDecision<RetryChoice>) {
        self.forward_retry_prompt(place, decision);
    }
}
