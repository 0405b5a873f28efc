use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use presenter_core::{LifecycleState, Presenter};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Config;
use crate::forecast::{ForecastController, ForecastSurface};
use crate::home::{HomeController, HomeSurface, RetryChoice};
use crate::model::Place;
use crate::repository::{SimulatedRepository, WeatherRepository, openweather::OpenWeatherRepository};
use crate::surface::{TerminalSurface, UiRequest};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-app", version, about = "Coroutine-style weather screens in the terminal")]
pub struct Cli {
    /// Use the simulated data source even when an API key is configured.
    #[arg(long)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key used for live data.
    Configure,

    /// Load the demo places one after the other.
    Sequential,

    /// Load the demo places concurrently.
    Parallel,

    /// Start from a misspelled place and offer retry/cancel.
    Retry,

    /// Show the average temperature across the demo places.
    Average,

    /// Show the multi-day forecast for a place.
    Forecast {
        /// Place as "Name,country"; defaults to Venice,it.
        place: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let repository = build_repository(&config, self.offline);

        match self.command {
            Command::Configure => configure(),
            Command::Sequential => run_home(repository, |home| home.load_sequential()).await,
            Command::Parallel => run_home(repository, |home| home.load_parallel()).await,
            Command::Retry => run_home(repository, |home| home.load_with_retry()).await,
            Command::Average => {
                run_home(repository, |home| home.load_average_temperature()).await
            }
            Command::Forecast { place } => run_forecast(repository, place).await,
        }
    }
}

fn demo_places() -> Vec<Place> {
    vec![
        Place::new("Venice", "it"),
        Place::new("London", "uk"),
        Place::new("New York", "us"),
    ]
}

fn build_repository(config: &Config, offline: bool) -> Rc<dyn WeatherRepository> {
    if !offline {
        if let Some(api_key) = &config.openweather_api_key {
            debug!("using the OpenWeather data source");
            return Rc::new(OpenWeatherRepository::new(api_key.clone()));
        }
    }
    debug!("using the simulated data source");
    Rc::new(SimulatedRepository::new(Duration::from_millis(
        config.simulated_latency_ms,
    )))
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()?;
    config.openweather_api_key = if api_key.is_empty() { None } else { Some(api_key) };
    config.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn run_home(
    repository: Rc<dyn WeatherRepository>,
    start: impl FnOnce(&Rc<HomeController>),
) -> Result<()> {
    let controller = HomeController::new(repository, demo_places());
    let (surface, mut requests) = TerminalSurface::new();
    controller
        .presenter()
        .attach_surface(Rc::clone(&surface) as Rc<dyn HomeSurface>);
    controller.presenter().notify_lifecycle_changed(LifecycleState::Resumed);

    start(&controller);
    drive(controller.presenter(), &mut requests).await;
    controller.cleanup();
    Ok(())
}

async fn run_forecast(repository: Rc<dyn WeatherRepository>, place: Option<String>) -> Result<()> {
    let place = match place {
        Some(raw) => parse_place(&raw)?,
        None => Place::new("Venice", "it"),
    };

    let controller = ForecastController::new(repository);
    let (surface, mut requests) = TerminalSurface::new();
    controller
        .presenter()
        .attach_surface(Rc::clone(&surface) as Rc<dyn ForecastSurface>);
    controller.presenter().notify_lifecycle_changed(LifecycleState::Resumed);

    controller.load_forecasts(place);
    drive(controller.presenter(), &mut requests).await;
    controller.cleanup();
    Ok(())
}

/// Pumps modal UI requests until every launched workflow has finished.
async fn drive<V: ?Sized + 'static>(
    presenter: &Rc<Presenter<V>>,
    requests: &mut mpsc::UnboundedReceiver<UiRequest>,
) {
    loop {
        if presenter.is_idle() && requests.is_empty() {
            break;
        }
        tokio::select! {
            request = requests.recv() => {
                if let Some(request) = request {
                    handle_request(request);
                }
            }
            () = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
    }
}

fn handle_request(request: UiRequest) {
    match request {
        UiRequest::RetryPrompt { place, decision } => {
            let message = format!("Could not retrieve the weather for {place}. Try again?");
            match inquire::Select::new(&message, vec!["Retry", "Cancel"]).prompt() {
                Ok("Retry") => decision.resume(RetryChoice::Retry),
                Ok(_) => decision.resume(RetryChoice::Cancel),
                Err(err) => decision.resume_with_error(anyhow::anyhow!("prompt failed: {err}")),
            }
        }
    }
}

fn parse_place(raw: &str) -> Result<Place> {
    let Some((name, country)) = raw.split_once(',') else {
        bail!("Expected a place as \"Name,country\", e.g. \"Venice,it\", got \"{raw}\"");
    };
    let (name, country) = (name.trim(), country.trim());
    if name.is_empty() || country.is_empty() {
        bail!("Expected a place as \"Name,country\", e.g. \"Venice,it\", got \"{raw}\"");
    }
    Ok(Place::new(name, country))
}
