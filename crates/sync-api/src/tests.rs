use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use atc_contracts::{
    Metrics, ObservedWeather, Scenario, SimulationConfig, SimulationSnapshot, WeatherInfo,
    WeatherKind,
};
use tokio::sync::oneshot;

use super::*;

fn snapshot_with(step: u64, config: SimulationConfig) -> SimulationSnapshot {
    SimulationSnapshot {
        step,
        config,
        planes: Vec::new(),
        airlines: Vec::new(),
        metrics: Metrics {
            total_arrivals: step,
            total_departures: 0,
            total_diverted: 0,
            emergencies: 0,
            waiting_priority: 0,
            advanced: None,
            tower: None,
            weather: WeatherInfo {
                kind: ObservedWeather::Known(WeatherKind::Normal),
                factor: 1.0,
            },
            time: None,
        },
        runways: Vec::new(),
    }
}

fn snapshot_body(step: u64) -> String {
    serde_json::to_string(&snapshot_with(step, SimulationConfig::default()))
        .expect("snapshot serializes")
}

enum Scripted {
    Respond(RawResponse),
    Fail(&'static str),
}

/// Answers requests from a queue and records every request it sees.
#[derive(Clone, Default)]
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<EngineRequest>>>,
}

impl ScriptedTransport {
    fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .expect("script lock")
            .push_back(Scripted::Respond(RawResponse::new(status, body)));
        self
    }

    fn fail(&self, reason: &'static str) -> &Self {
        self.responses
            .lock()
            .expect("script lock")
            .push_back(Scripted::Fail(reason));
        self
    }

    fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().expect("request lock").clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: EngineRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().expect("request lock").push(request);
        let next = self.responses.lock().expect("script lock").pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(reason)) => Err(TransportError::new("connection refused", reason)),
            None => Err(TransportError::new("script exhausted", "no response queued")),
        }
    }
}

/// Holds each step request until the test releases it, keyed by step count.
#[derive(Clone, Default)]
struct GatedTransport {
    gates: Arc<Mutex<HashMap<String, oneshot::Receiver<RawResponse>>>>,
}

impl GatedTransport {
    fn gate(&self, steps: i64) -> oneshot::Sender<RawResponse> {
        let (sender, receiver) = oneshot::channel();
        self.gates
            .lock()
            .expect("gate lock")
            .insert(steps.to_string(), receiver);
        sender
    }
}

impl Transport for GatedTransport {
    async fn send(&self, request: EngineRequest) -> Result<RawResponse, TransportError> {
        let key = request.query_value("steps").unwrap_or("state").to_string();
        let gate = self.gates.lock().expect("gate lock").remove(&key);
        let Some(gate) = gate else {
            return Err(TransportError::new("no gate", key));
        };
        gate.await
            .map_err(|err| TransportError::new("gate dropped", err))
    }
}

fn scripted_session() -> (SimulationSession<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::default();
    let client = SimulationClient::with_transport(transport.clone(), Routes::default());
    (SimulationSession::new(client), transport)
}

fn gated_session() -> (SimulationSession<GatedTransport>, GatedTransport) {
    let transport = GatedTransport::default();
    let client = SimulationClient::with_transport(transport.clone(), Routes::default());
    (SimulationSession::new(client), transport)
}

fn normal_config() -> SimulationConfig {
    SimulationConfig::default()
        .with_scenario(Scenario::Normal)
        .with_diversion(false)
        .with_max_holding_time(10.0)
        .with_forced_weather(WeatherKind::None)
        .with_probabilistic(true)
}

#[tokio::test]
async fn reset_returns_step_zero_and_initializes_cache() {
    let (session, transport) = scripted_session();
    let config = normal_config();
    let body = serde_json::to_string(&snapshot_with(0, config.clone())).expect("serializes");
    transport.respond(200, body);

    let snapshot = session.reset(&config).await.expect("reset succeeds");

    assert_eq!(snapshot.step, 0);
    assert_eq!(snapshot.config, config);
    assert!(session.cache().is_initialized());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].path, "simulation/reset");
    assert_eq!(
        requests[0].body,
        Some(serde_json::to_value(&config).expect("config value"))
    );
}

#[tokio::test]
async fn non_positive_step_never_reaches_the_engine() {
    let (session, transport) = scripted_session();

    for count in [0, -1] {
        let err = session.step(count).await.expect_err("count below 1");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.status(), None);
    }

    assert!(transport.requests().is_empty());
    assert!(!session.cache().is_initialized());
}

#[tokio::test]
async fn negative_config_is_rejected_locally() {
    let (session, transport) = scripted_session();
    let config = normal_config().with_turn_time(-3.0);

    let err = session.reset(&config).await.expect_err("negative turn time");
    assert!(matches!(
        err,
        SyncError::InvalidArgument { argument: "turn_time", .. }
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn step_sends_count_as_query() {
    let (session, transport) = scripted_session();
    transport.respond(200, snapshot_body(5));

    let snapshot = session.step(5).await.expect("step succeeds");

    assert_eq!(snapshot.step, 5);
    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].path, "simulation/step");
    assert_eq!(requests[0].query_value("steps"), Some("5"));
    assert_eq!(requests[0].body, None);
}

#[tokio::test]
async fn step_once_defaults_to_a_single_step() {
    let (session, transport) = scripted_session();
    transport.respond(200, snapshot_body(1));

    session.client().step_once().await.expect("step succeeds");
    assert_eq!(transport.requests()[0].query_value("steps"), Some("1"));
}

#[tokio::test]
async fn get_state_reads_with_get() {
    let (session, transport) = scripted_session();
    transport.respond(200, snapshot_body(2)).respond(200, snapshot_body(2));

    let first = session.get_state().await.expect("state");
    let second = session.get_state().await.expect("state again");

    assert_eq!(first, second);
    let requests = transport.requests();
    assert!(requests
        .iter()
        .all(|request| request.method == Method::Get && request.path == "simulation/state"));
}

#[tokio::test]
async fn legacy_routes_target_spanish_paths() {
    let transport = ScriptedTransport::default();
    transport.respond(200, snapshot_body(0));
    let client = SimulationClient::with_transport(transport.clone(), Routes::legacy());

    client.get_state().await.expect("state");
    assert_eq!(transport.requests()[0].path, "simulacion/estado");
}

#[tokio::test]
async fn transport_failure_keeps_last_good_snapshot() {
    let (session, transport) = scripted_session();
    transport.respond(200, snapshot_body(5)).fail("engine unreachable");

    session.step(5).await.expect("step succeeds");
    let err = session.get_state().await.expect_err("transport failure");

    assert_eq!(err.kind(), ErrorKind::Transport);
    let view = session.view();
    assert_eq!(view.step(), Some(5));
    assert!(view.initialized);
    assert_eq!(view.revision, 1);
}

#[tokio::test]
async fn remote_failure_carries_status_and_detail() {
    let (session, transport) = scripted_session();
    transport.respond(409, r#"{"detail":"simulation not initialized"}"#);

    let err = session.step(1).await.expect_err("engine rejects");

    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.status(), Some(409));
    let SyncError::Remote(remote) = err else {
        panic!("expected remote error");
    };
    assert_eq!(remote.detail().as_deref(), Some("simulation not initialized"));
    assert!(session.cache().latest().is_none());
}

#[tokio::test]
async fn malformed_success_body_is_schema_error() {
    let (session, transport) = scripted_session();
    transport
        .respond(200, r#"{"step": 1}"#)
        .respond(200, "<html>maintenance</html>");

    let missing = session.get_state().await.expect_err("incomplete snapshot");
    let SyncError::Schema(schema) = missing else {
        panic!("expected schema error");
    };
    assert_eq!(schema.path, "config");

    let text = session.get_state().await.expect_err("text body");
    assert_eq!(text.kind(), ErrorKind::Schema);
    assert!(!session.cache().is_initialized());
}

#[tokio::test]
async fn sequential_steps_never_decrease() {
    let (session, transport) = scripted_session();
    for step in [1, 3, 6, 10] {
        transport.respond(200, snapshot_body(step));
    }

    let mut previous = 0;
    for count in [1, 2, 3, 4] {
        let snapshot = session.step(count).await.expect("step succeeds");
        assert!(snapshot.step >= previous);
        previous = snapshot.step;
    }
    assert_eq!(session.view().step(), Some(10));
}

#[tokio::test]
async fn older_call_completing_late_is_discarded() {
    let (session, transport) = gated_session();
    let release_first = transport.gate(1);
    let release_second = transport.gate(2);
    let mut subscription = session.subscribe();

    let first = session.spawn(SyncRequest::Step(1));
    let second = session.spawn(SyncRequest::Step(2));
    assert!(first.token() < second.token());

    release_second
        .send(RawResponse::new(200, snapshot_body(3)))
        .expect("second gate open");
    second.wait().await.expect("second call succeeds");

    release_first
        .send(RawResponse::new(200, snapshot_body(1)))
        .expect("first gate open");
    let stale = first.wait().await.expect("first call succeeds");

    assert_eq!(stale.step, 1);
    assert_eq!(session.view().step(), Some(3));

    let steps: Vec<Option<u64>> = subscription.drain().iter().map(CacheView::step).collect();
    assert_eq!(steps, vec![None, Some(3)]);
}

/// Panics on every request, standing in for a bug inside the call task.
#[derive(Clone, Copy, Default)]
struct PanickingTransport;

impl Transport for PanickingTransport {
    async fn send(&self, _request: EngineRequest) -> Result<RawResponse, TransportError> {
        panic!("transport bug");
    }
}

#[tokio::test]
async fn panicked_call_names_the_task_failure() {
    let client = SimulationClient::with_transport(PanickingTransport, Routes::default());
    let session = SimulationSession::new(client);

    let err = session
        .spawn(SyncRequest::GetState)
        .wait()
        .await
        .expect_err("panicked task has no snapshot");

    let SyncError::Transport(transport) = err else {
        panic!("expected transport error, got {err:?}");
    };
    assert_eq!(transport.context(), "sync task panicked");
    assert!(!transport.is_timeout());
    assert!(!session.cache().is_initialized());
}

#[tokio::test]
async fn abandoned_call_still_lands_when_not_superseded() {
    let (session, transport) = gated_session();
    let release = transport.gate(4);
    let mut subscription = session.subscribe();
    assert_eq!(subscription.recv().await.and_then(|view| view.step()), None);

    session.spawn(SyncRequest::Step(4)).abandon();
    release
        .send(RawResponse::new(200, snapshot_body(4)))
        .expect("gate open");

    let view = subscription.recv().await.expect("cache update");
    assert_eq!(view.step(), Some(4));
    assert!(view.initialized);
}

#[tokio::test]
async fn abandoned_stale_call_never_overwrites() {
    let (session, transport) = gated_session();
    let release_old = transport.gate(1);
    let release_new = transport.gate(2);

    session.spawn(SyncRequest::Step(1)).abandon();
    let newer = session.spawn(SyncRequest::Step(2));

    release_new
        .send(RawResponse::new(200, snapshot_body(2)))
        .expect("new gate open");
    newer.wait().await.expect("newer call succeeds");

    release_old
        .send(RawResponse::new(200, snapshot_body(1)))
        .expect("old gate open");
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    assert_eq!(session.view().step(), Some(2));
    assert_eq!(session.view().revision, 1);
}

#[tokio::test]
async fn late_subscriber_gets_latest_only() {
    let (session, transport) = scripted_session();
    for step in 1..=3 {
        transport.respond(200, snapshot_body(step));
    }
    for _ in 0..3 {
        session.step(1).await.expect("step succeeds");
    }

    let mut subscription = session.subscribe();
    let first = subscription.try_recv().expect("immediate delivery");
    assert_eq!(first.step(), Some(3));
    assert!(subscription.try_recv().is_none());

    transport.respond(200, snapshot_body(4));
    session.step(1).await.expect("step succeeds");
    assert_eq!(subscription.try_recv().and_then(|view| view.step()), Some(4));
}

#[tokio::test]
async fn end_to_end_reset_step_then_failure() {
    let (session, transport) = scripted_session();
    let config = normal_config();
    transport
        .respond(
            200,
            serde_json::to_string(&snapshot_with(0, config.clone())).expect("serializes"),
        )
        .respond(
            200,
            serde_json::to_string(&snapshot_with(5, config.clone())).expect("serializes"),
        )
        .fail("connection reset");

    let reset = session.reset(&config).await.expect("reset succeeds");
    assert_eq!(reset.step, 0);
    assert!(reset.planes.is_empty());
    assert!(session.cache().is_initialized());

    let stepped = session.step(5).await.expect("step succeeds");
    assert_eq!(stepped.step, 5);

    let err = session.get_state().await.expect_err("transport failure");
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(session.view().step(), Some(5));
    assert!(session.cache().is_initialized());
}
