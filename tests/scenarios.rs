#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tears_query::producer::ProducerFuture;
use tears_query::{
    Latency, MutationOptions, MutationResource, QueryClient, QueryOptions, QueryResource,
    ResourceError, Status,
};
use tokio::time::{Duration, Instant, sleep};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    id: u32,
    name: &'static str,
}

fn locations() -> Vec<Location> {
    vec![
        Location { id: 1, name: "North" },
        Location { id: 2, name: "South" },
        Location { id: 3, name: "Harbor" },
    ]
}

#[tokio::test(start_paused = true)]
async fn test_locations_query_settles_after_fetch_latency() {
    let query = QueryResource::new(
        &"locations",
        || -> ProducerFuture<Vec<Location>> {
            Box::pin(async {
                sleep(Duration::from_millis(150)).await;
                Ok(locations())
            })
        },
        QueryOptions::default(),
    );

    let initial = query.state();
    assert!(initial.loading);
    assert_eq!(initial.data, None);
    assert_eq!(initial.status(), Status::Pending);

    let start = Instant::now();
    let mut rx = query.subscribe();
    let settled = rx.wait_for(|state| !state.loading).await.unwrap().clone();

    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(settled.error, None);
    assert_eq!(settled.data.map(|data| data.len()), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_conflicting_mutation_rejects_and_stores_error() {
    let create = MutationResource::with_options(
        |_location: Location| -> ProducerFuture<Location> {
            Box::pin(async { Err(ResourceError::new("Conflict")) })
        },
        MutationOptions::default().with_latency(Latency::MOCK_MUTATION),
    );

    let outcome = create
        .mutate(Location {
            id: 4,
            name: "Harbor",
        })
        .await;

    let error = outcome.unwrap_err();
    assert_eq!(error.message(), "Conflict");

    let state = create.state();
    assert!(!state.loading);
    assert_eq!(state.error.as_ref().map(ResourceError::message), Some("Conflict"));
    assert_eq!(state.status(), Status::Failure);
}

#[tokio::test(start_paused = true)]
async fn test_instances_with_the_same_key_do_not_share_state() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = {
        let calls = Arc::clone(&calls);
        move || -> ProducerFuture<usize> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(n) })
        }
    };

    let first = QueryResource::new(&"staff", fetcher.clone(), QueryOptions::default());
    let second = QueryResource::new(&"staff", fetcher, QueryOptions::default());

    let mut rx = first.subscribe();
    rx.wait_for(|state| !state.loading).await.unwrap();
    let mut rx = second.subscribe();
    rx.wait_for(|state| !state.loading).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2, "each instance fetches on its own");

    first.refetch().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(first.state().data, Some(3));
    assert!(
        matches!(second.state().data, Some(1 | 2)),
        "refetching one instance leaves the other alone"
    );
}

#[tokio::test(start_paused = true)]
async fn test_mutation_invalidation_refreshes_shared_query() {
    let client = Arc::new(QueryClient::new());
    let store = Arc::new(std::sync::Mutex::new(locations()));

    let reader = Arc::clone(&store);
    let list = QueryResource::new(
        &"locations",
        move || -> ProducerFuture<Vec<Location>> {
            let snapshot = reader.lock().unwrap().clone();
            Box::pin(async move { Ok(snapshot) })
        },
        QueryOptions::default()
            .with_latency(Latency::MOCK_QUERY)
            .with_client(Arc::clone(&client)),
    );

    let writer = Arc::clone(&store);
    let create = MutationResource::with_options(
        move |location: Location| -> ProducerFuture<Location> {
            writer.lock().unwrap().push(location.clone());
            Box::pin(async move { Ok(location) })
        },
        MutationOptions::default().with_latency(Latency::MOCK_MUTATION),
    );

    let mut rx = list.subscribe();
    rx.wait_for(|state| !state.loading).await.unwrap();
    assert_eq!(list.state().data.map(|data| data.len()), Some(3));

    create
        .mutate(Location {
            id: 4,
            name: "East Wing",
        })
        .await
        .unwrap();
    assert_eq!(client.invalidate(&"locations"), 1);

    let refreshed = rx
        .wait_for(|state| !state.loading && state.data.as_ref().is_some_and(|d| d.len() == 4))
        .await
        .unwrap()
        .clone();
    assert_eq!(
        refreshed.data.unwrap().last().map(|location| (location.id, location.name)),
        Some((4, "East Wing"))
    );
}
