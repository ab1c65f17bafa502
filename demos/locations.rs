//! Locations page of a facility dashboard, run headless.
//!
//! The page lists locations from an in-memory store with mock latency, polls
//! an occupancy figure, creates a location once the list has loaded and
//! invalidates the list so it refetches. It quits when the new location shows
//! up.
//!
//! Run with: `RUST_LOG=debug cargo run --example locations`

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::Result;
use rand::Rng;
use tears_query::prelude::*;
use tears_query::producer::ProducerFuture;
use tears_query::{Latency, QueryClient};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone)]
struct Location {
    name: String,
    capacity: u32,
}

type Store = Arc<Mutex<Vec<Location>>>;

fn seed() -> Store {
    let location = |name: &str, capacity| Location {
        name: name.to_string(),
        capacity,
    };
    Arc::new(Mutex::new(vec![
        location("North Hall", 120),
        location("South Court", 80),
        location("Harbor Studio", 40),
    ]))
}

enum Message {
    Locations(ResourceState<Vec<Location>>),
    Occupancy(ResourceState<u32>),
    Created(Result<Location, ResourceError>),
}

struct LocationsPage {
    client: Arc<QueryClient>,
    locations: QueryResource<Vec<Location>>,
    occupancy: QueryResource<u32>,
    create: MutationResource<Location, Location>,
    submitted: bool,
}

impl Application for LocationsPage {
    type Message = Message;
    type Flags = Store;

    fn new(store: Store) -> (Self, Command<Message>) {
        let client = Arc::new(QueryClient::new());

        let reader = Arc::clone(&store);
        let locations = QueryResource::new(
            &"locations",
            move || -> ProducerFuture<Vec<Location>> {
                let snapshot = reader
                    .lock()
                    .map(|locations| locations.clone())
                    .map_err(|_| ResourceError::new("location store poisoned"));
                Box::pin(async move { snapshot })
            },
            QueryOptions::default()
                .with_latency(Latency::MOCK_QUERY)
                .with_client(Arc::clone(&client)),
        );

        let occupancy = QueryResource::new(
            &"occupancy",
            || -> ProducerFuture<u32> {
                // Stand-in for a live sensor feed.
                let people = rand::thread_rng().gen_range(40..=180);
                Box::pin(async move { Ok(people) })
            },
            QueryOptions::default()
                .with_latency(Latency::MOCK_QUERY)
                .with_poll_interval(Duration::from_secs(1)),
        );

        let create = MutationResource::with_options(
            move |location: Location| -> ProducerFuture<Location> {
                let outcome = match store.lock() {
                    Ok(mut locations) => {
                        if locations.iter().any(|l| l.name == location.name) {
                            Err(ResourceError::new("Conflict"))
                        } else {
                            locations.push(location.clone());
                            Ok(location)
                        }
                    }
                    Err(_) => Err(ResourceError::new("location store poisoned")),
                };
                Box::pin(async move { outcome })
            },
            MutationOptions::default().with_latency(Latency::MOCK_MUTATION),
        );

        let page = Self {
            client,
            locations,
            occupancy,
            create,
            submitted: false,
        };
        (page, Command::none())
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Locations(state) => match state.status() {
                Status::Pending => {
                    info!("loading locations");
                    Command::none()
                }
                Status::Failure => {
                    warn!(error = ?state.error, "locations failed");
                    Command::none()
                }
                Status::Success | Status::Idle => {
                    let locations = state.data.unwrap_or_default();
                    for location in &locations {
                        info!(name = %location.name, capacity = location.capacity, "location");
                    }

                    if !self.submitted {
                        self.submitted = true;
                        let new_location = Location {
                            name: "East Wing".to_string(),
                            capacity: 60,
                        };
                        return self.create.command(new_location).map(Message::Created);
                    }
                    if locations.iter().any(|l| l.name == "East Wing") {
                        info!("new location listed, quitting");
                        return Command::effect(Action::Quit);
                    }
                    Command::none()
                }
            },
            Message::Occupancy(state) => {
                if let Some(people) = state.data {
                    info!(people, refreshing = state.loading, "occupancy");
                }
                Command::none()
            }
            Message::Created(Ok(location)) => {
                info!(name = %location.name, "location created");
                self.client.invalidate_command(&"locations")
            }
            Message::Created(Err(err)) => {
                warn!(error = %err, "create failed");
                Command::effect(Action::Quit)
            }
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        vec![
            Subscription::new(self.locations.watch()).map(Message::Locations),
            Subscription::new(self.occupancy.watch()).map(Message::Occupancy),
        ]
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let page = Runtime::<LocationsPage>::new(seed()).run().await?;
    info!(
        created = page.create.state().is_success(),
        occupancy = ?page.occupancy.state().data,
        "done"
    );
    Ok(())
}
