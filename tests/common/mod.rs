#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use coagent::{
    Agent, AgentBuilder, AgentConfig, AgentDeps, CommandError, EventBatch, EventStreamRequest,
    OrchestratorEvent, PodPrefixConfig, Producer, ProducerError, ProducerOutput, ProducerSet,
    ResourceAction, RuntimeClient, RuntimeConnector, SinkError, StreamSink, Subscribe,
    UserEvent, UserEventFilter, UserEventSource, WatchFuture,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn batch(uid: &str) -> EventBatch {
    EventBatch::new(vec![OrchestratorEvent {
        kind: "Pod".into(),
        uid: uid.into(),
        name: format!("pod-{uid}"),
        namespace: Some("default".into()),
        action: ResourceAction::Added,
    }])
}

pub fn user_event(kind: &str, uid: &str) -> UserEvent {
    UserEvent {
        kind: kind.into(),
        uid: uid.into(),
        reason: "Scheduled".into(),
        message: format!("assigned {uid}"),
        debug: false,
    }
}

/// Producer that feeds a fixed list of batches from a background task.
///
/// `bulk_done` fires after the first batch is queued; the queue closes after the last.
pub struct ListingProducer {
    pub batches: Vec<EventBatch>,
    pub seen_prefixes: Mutex<Vec<PodPrefixConfig>>,
    pub closes: AtomicUsize,
}

impl ListingProducer {
    pub fn new(batches: Vec<EventBatch>) -> Self {
        Self {
            batches,
            seen_prefixes: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Producer for ListingProducer {
    fn name(&self) -> &str {
        "listing"
    }

    async fn start(
        &self,
        ctx: CancellationToken,
        request: &EventStreamRequest,
        pod_prefixes: &PodPrefixConfig,
    ) -> Result<ProducerOutput, ProducerError> {
        self.seen_prefixes.lock().unwrap().push(pod_prefixes.clone());

        let (tx, events) = mpsc::channel(request.queue_capacity());
        let (done_tx, bulk_done) = oneshot::channel();
        let batches = self.batches.clone();
        tokio::spawn(async move {
            let mut done_tx = Some(done_tx);
            for batch in batches {
                tokio::select! {
                    _ = ctx.cancelled() => return,
                    sent = tx.send(batch) => if sent.is_err() { return },
                }
                if let Some(done) = done_tx.take() {
                    let _ = done.send(());
                }
            }
        });
        Ok(ProducerOutput { events, bulk_done })
    }

    fn close_client(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Producer that queues every batch before returning, keeping `bulk_done` pending.
pub struct PrefilledProducer {
    pub batches: Vec<EventBatch>,
    pub bulk_done: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl Producer for PrefilledProducer {
    fn name(&self) -> &str {
        "prefilled"
    }

    async fn start(
        &self,
        _ctx: CancellationToken,
        _request: &EventStreamRequest,
        _pod_prefixes: &PodPrefixConfig,
    ) -> Result<ProducerOutput, ProducerError> {
        let (tx, events) = mpsc::channel(self.batches.len().max(1));
        for batch in self.batches.iter().cloned() {
            tx.try_send(batch).expect("queue sized for every batch");
        }
        let (done_tx, bulk_done) = oneshot::channel();
        *self.bulk_done.lock().unwrap() = Some(done_tx);
        // `tx` is dropped here, so the queue closes once drained.
        Ok(ProducerOutput { events, bulk_done })
    }
}

pub struct FailingProducer;

#[async_trait]
impl Producer for FailingProducer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn start(
        &self,
        _ctx: CancellationToken,
        _request: &EventStreamRequest,
        _pod_prefixes: &PodPrefixConfig,
    ) -> Result<ProducerOutput, ProducerError> {
        Err(ProducerError::WatchSetup {
            reason: "api server unreachable".into(),
        })
    }
}

/// User event source that emits a list, then idles until cancelled and lingers for
/// `linger` before returning.
pub struct IdleSource {
    pub events: Vec<UserEvent>,
    pub linger: Duration,
    pub starts: AtomicUsize,
}

impl IdleSource {
    pub fn new(events: Vec<UserEvent>, linger: Duration) -> Self {
        Self {
            events,
            linger,
            starts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UserEventSource for IdleSource {
    async fn start(
        &self,
        ctx: CancellationToken,
        tx: mpsc::Sender<UserEvent>,
        _filter: &UserEventFilter,
    ) -> Result<WatchFuture, ProducerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let events = self.events.clone();
        let linger = self.linger;
        Ok(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            ctx.cancelled().await;
            tokio::time::sleep(linger).await;
        }
        .boxed())
    }
}

/// Runtime client recording every call.
#[derive(Default)]
pub struct RecordingRuntime {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl RuntimeClient for RecordingRuntime {
    async fn stop(&self, id: &str, grace: Duration) -> Result<(), CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("stop {id} {}s", grace.as_secs()));
        Ok(())
    }

    async fn pause(&self, id: &str) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(format!("pause {id}"));
        Ok(())
    }

    async fn unpause(&self, id: &str) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(format!("unpause {id}"));
        Err(CommandError::RuntimeCommandFailed {
            reason: format!("container {id} is not paused"),
        })
    }

    async fn kill(&self, id: &str, signal: &str) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(format!("kill {id} {signal}"));
        Ok(())
    }
}

pub struct SharedConnector(pub Arc<RecordingRuntime>);

#[async_trait]
impl RuntimeConnector for SharedConnector {
    async fn connect(
        &self,
        _endpoint: &str,
        _api_version: Option<&str>,
    ) -> Result<Arc<dyn RuntimeClient>, CommandError> {
        Ok(self.0.clone())
    }
}

/// Sink whose transport fails on every send.
pub struct BrokenSink;

#[async_trait]
impl<T: Send + 'static> StreamSink<T> for BrokenSink {
    async fn send(&mut self, _item: T) -> Result<(), SinkError> {
        Err(SinkError::Transport {
            reason: "connection reset by peer".into(),
        })
    }
}

/// Subscriber collecting every event it sees.
#[derive(Default)]
pub struct Collector {
    pub events: Mutex<Vec<coagent::Event>>,
}

#[async_trait]
impl Subscribe for Collector {
    async fn on_event(&self, event: &coagent::Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

pub struct Harness {
    pub agent: Arc<Agent>,
    pub runtime: Arc<RecordingRuntime>,
}

pub fn agent_with(producers: ProducerSet, source: Arc<dyn UserEventSource>) -> Harness {
    agent_with_subscribers(producers, source, Vec::new())
}

pub fn agent_with_subscribers(
    producers: ProducerSet,
    source: Arc<dyn UserEventSource>,
    subscribers: Vec<Arc<dyn Subscribe>>,
) -> Harness {
    init_tracing();
    let runtime = Arc::new(RecordingRuntime::default());
    let agent = AgentBuilder::new(AgentConfig::default())
        .with_subscribers(subscribers)
        .with_export_enabled(true)
        .build(AgentDeps {
            producers,
            user_events: source,
            connector: Arc::new(SharedConnector(runtime.clone())),
        });
    Harness { agent, runtime }
}

/// Yields until `cond` holds, up to a generous bound.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
