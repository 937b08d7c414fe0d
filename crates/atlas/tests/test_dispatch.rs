mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use atlas::{
    AtlasLoader, Client, Error, Event, Request, Response, Spawner, Surface, WorkerConfig,
    WorkerHandle,
};
use futures_util::future::join_all;
use serde_json::{json, Value};

use common::{init_tracing, sum_of_squares, RecordingLoader};

async fn atlas_worker() -> WorkerHandle {
    init_tracing();
    Spawner::new(WorkerConfig::default().with_concurrency(2))
        .spawn(|| Ok(AtlasLoader))
        .await
        .expect("Failed to spawn worker")
}

async fn recording_worker(concurrency: usize) -> (WorkerHandle, Arc<Mutex<Vec<Surface>>>) {
    init_tracing();
    let attached = Arc::new(Mutex::new(Vec::new()));
    let shared = attached.clone();
    let worker = Spawner::new(WorkerConfig::default().with_concurrency(concurrency))
        .spawn(move || Ok(RecordingLoader { attached: shared }))
        .await
        .expect("Failed to spawn worker");
    (worker, attached)
}

fn canvas() -> Surface {
    Surface {
        id: "main".into(),
        width: 640,
        height: 480,
    }
}

#[tokio::test]
async fn test_attach_reaches_compute_module() {
    let (worker, attached) = recording_worker(1).await;
    let client = worker.client();

    let request = Request::new("attach", json!({ "canvas": canvas() }));
    let response = client.send(request).await.unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!(["Ok", { "id": "main", "width": 640, "height": 480 }])
    );
    assert_eq!(*attached.lock().unwrap(), vec![canvas()]);
}

#[tokio::test]
async fn test_unknown_action_keeps_worker_usable() {
    let worker = atlas_worker().await;
    let client = worker.client();

    let response = client.send(Request::new("bogus", json!({}))).await.unwrap();
    assert_eq!(response, Response::Err("unknown action: bogus".into()));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!(["Err", "unknown action: bogus"])
    );

    assert_eq!(client.inc().await.unwrap(), 1);

    let err = client.call("bogus", Value::Null).await.unwrap_err();
    assert!(matches!(err, Error::Rejected(message) if message == "unknown action: bogus"));
}

#[tokio::test]
async fn test_invalid_payload_is_an_error_response() {
    let worker = atlas_worker().await;
    let client = worker.client();

    let response = client
        .send(Request::new("attach", json!({ "canvas": "not a canvas" })))
        .await
        .unwrap();
    match response {
        Response::Err(message) => assert!(message.starts_with("Invalid payload for `attach`")),
        other => panic!("unexpected response: {other:?}"),
    }

    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_crunch_overflow_is_an_error_response() {
    let worker = atlas_worker().await;
    let client = worker.client();

    let response = client
        .send(Request::new("crunch", json!({ "limit": 4_000_000 })))
        .await
        .unwrap();
    assert_eq!(
        response,
        Response::Err("crunch limit 4000000 overflows".into())
    );

    assert_eq!(client.crunch(1_000).await.unwrap(), sum_of_squares(1_000));
}

#[tokio::test]
async fn test_execution_errors_do_not_crash_worker() {
    let (worker, _) = recording_worker(1).await;
    let client = worker.client();

    let response = client.send(Request::new("inc", Value::Null)).await.unwrap();
    assert_eq!(response, Response::Err("counter is read-only".into()));

    let response = client.send(Request::new("dec", Value::Null)).await.unwrap();
    assert_eq!(
        response,
        Response::Err("compute module panicked: counter underflow".into())
    );

    let response = client.send(Request::new("ping", Value::Null)).await.unwrap();
    assert_eq!(response, Response::Ok(json!("pong")));
}

#[tokio::test]
async fn test_concurrent_requests_get_their_own_responses() {
    let worker = atlas_worker().await;
    let client = worker.client();

    let limits = (1..=16u32).map(|i| i * 7).collect::<Vec<_>>();
    let requests = limits.iter().map(|&limit| {
        let client = client.clone();
        async move { (limit, client.crunch(limit).await) }
    });

    for (limit, result) in join_all(requests).await {
        assert_eq!(result.unwrap(), sum_of_squares(limit.into()));
    }
}

#[tokio::test]
async fn test_two_clients_in_flight() {
    let worker = atlas_worker().await;
    let (a, b) = (worker.client(), worker.client());

    let (ra, rb) = tokio::join!(
        a.send(Request::new("crunch", json!({ "limit": 3 }))),
        b.send(Request::new("crunch", json!({ "limit": 4 }))),
    );
    assert_eq!(ra.unwrap(), Response::Ok(json!(14)));
    assert_eq!(rb.unwrap(), Response::Ok(json!(30)));
}

#[tokio::test]
async fn test_pool_sized_to_concurrency_hint() {
    let (worker, _) = recording_worker(3).await;
    let threads = worker.client().call("query", Value::Null).await.unwrap();
    assert_eq!(threads, json!(3));
}

#[tokio::test]
async fn test_request_timeout_leaves_worker_usable() {
    let (worker, _) = recording_worker(1).await;
    let client = worker.client();

    let slow = Request::new("crunch", json!({ "limit": 300 }));
    let err = client
        .send_timeout(slow, Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestTimeout(_)));

    let response = client.send(Request::new("ping", Value::Null)).await.unwrap();
    assert_eq!(response, Response::Ok(json!("pong")));
}

#[tokio::test]
async fn test_observe_receives_events() {
    let worker = atlas_worker().await;
    let client = worker.client();

    let mut events = client.observe().unwrap();
    client.ping().await.unwrap();
    client.ping().await.unwrap();

    assert_eq!(events.recv().await, Some(Event::new("count", 1)));
    assert_eq!(events.recv().await, Some(Event::new("count", 2)));

    // A closed subscription is dropped quietly.
    drop(events);
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_counter_round_trip() -> atlas::Result<()> {
    let worker = atlas_worker().await;
    let client: Client = worker.client();

    assert_eq!(client.query().await?, 0);
    assert_eq!(client.inc().await?, 1);
    assert_eq!(client.inc().await?, 2);
    assert_eq!(client.dec().await?, 1);
    assert_eq!(client.query().await?, 1);

    let attached = client.attach(canvas()).await?;
    assert_eq!(attached, canvas());

    worker.terminate().await
}
