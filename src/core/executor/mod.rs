//! Request execution
//!
//! The executor is the only component with scheduler responsibility: it walks
//! the router's chain, gates each provider through its circuit breaker and
//! the advisory rate window, enforces the per-attempt timeout, retries with
//! jittered backoff, optionally races the top providers, and forwards
//! normalized deltas to the caller. Every attempt outcome is folded into the
//! breaker and health registries and the bounded attempt history.
//!
//! Stream contract, as seen by callers:
//! - a successful stream ends with exactly one `final` delta;
//! - a failure after deltas have been forwarded terminates the stream with an
//!   error-marked final delta (no cross-provider failover mid-stream);
//! - exhaustion before any delta yields the offline stream for chat, or a
//!   typed `AllProvidersFailed` for every other capability.

pub mod backoff;
pub mod history;
pub mod rate;

use futures::stream::{self, Stream, StreamExt};
use pin_project_lite::pin_project;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use crate::core::breaker::{BreakerRegistry, BreakerState};
use crate::core::error::{ErrorKind, RelayError, Result};
use crate::core::health::HealthTracker;
use crate::core::providers::{ProviderAdapter, ProviderId};
use crate::core::router::{Chain, Router};
use crate::core::streaming::DeltaAssembler;
use crate::core::types::{
    Capability, Delta, ProviderConfig, ProviderHealthView, RequestIntent, RetryPolicy,
};

pub use history::{Attempt, AttemptHistory, AttemptOutcome, HISTORY_CAP};
pub use rate::RpmGate;

/// Fixed response streamed when every chat provider is exhausted.
pub const OFFLINE_MESSAGE: &str =
    "All language model providers are currently unreachable. The request was not completed; \
     check provider status and network connectivity, then try again.";

pin_project! {
    /// Lazy, finite, non-restartable sequence of deltas.
    pub struct DeltaStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Delta> + Send>>,
    }
}

impl DeltaStream {
    fn new(inner: Pin<Box<dyn Stream<Item = Delta> + Send>>) -> Self {
        Self { inner }
    }

    /// Stream over an already-materialized delta sequence.
    pub fn from_deltas(deltas: Vec<Delta>) -> Self {
        Self::new(Box::pin(stream::iter(deltas)))
    }

    /// Drain the stream into its concatenated text.
    ///
    /// An error-marked final delta becomes a typed error carrying its kind
    /// and message.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(delta) = self.next().await {
            if let Some(kind) = delta.error {
                return Err(RelayError::provider("relay", kind, delta.content));
            }
            text.push_str(&delta.content);
        }
        Ok(text)
    }
}

impl Stream for DeltaStream {
    type Item = Delta;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// Event sent from the driver task to the caller-facing stream.
///
/// `Exhausted` is only ever sent as the very first event; once a delta has
/// been forwarded, failures surface in-band as error-marked final deltas.
enum DriverEvent {
    Delta(Delta),
    Exhausted(RelayError),
}

enum AttemptResult {
    Completed,
    CallerGone,
    Failed(RelayError),
}

enum ProviderRun {
    Completed,
    CallerGone,
    MidStreamFailure,
    Exhausted(ErrorKind),
}

enum Forward {
    Continue,
    Done,
    CallerGone,
}

enum RaceVerdict {
    Handled,
    NoWinner(Option<ErrorKind>),
}

/// Executes one intent end-to-end against the provider chain.
pub struct RetryExecutor {
    adapters: HashMap<ProviderId, Arc<ProviderAdapter>>,
    configs: HashMap<ProviderId, ProviderConfig>,
    router: Router,
    breakers: Arc<BreakerRegistry>,
    health: Arc<HealthTracker>,
    policy: RetryPolicy,
    history: AttemptHistory,
    rpm: RpmGate,
}

impl RetryExecutor {
    pub fn new(
        adapters: HashMap<ProviderId, Arc<ProviderAdapter>>,
        configs: HashMap<ProviderId, ProviderConfig>,
        policy: RetryPolicy,
    ) -> Self {
        let breakers = Arc::new(BreakerRegistry::new());
        let health = Arc::new(HealthTracker::new());

        let mut registered: Vec<ProviderId> = adapters.keys().copied().collect();
        registered.sort();
        let router = Router::new(
            registered,
            configs.clone(),
            Arc::clone(&health),
            Arc::clone(&breakers),
        );

        Self {
            adapters,
            configs,
            router,
            breakers,
            health,
            policy,
            history: AttemptHistory::new(),
            rpm: RpmGate::new(),
        }
    }

    /// Registered providers, in stable order.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }

    /// Adapter handle, e.g. for hot-swapping the model identifier.
    pub fn adapter(&self, provider: ProviderId) -> Option<Arc<ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    fn config(&self, provider: ProviderId) -> ProviderConfig {
        self.configs
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::defaults_for(provider))
    }

    /// Recent attempt records, oldest first.
    pub fn recent_attempts(&self) -> Vec<Attempt> {
        self.history.recent()
    }

    /// Per-provider health/breaker view.
    pub fn status(&self) -> Vec<ProviderHealthView> {
        self.providers()
            .into_iter()
            .map(|provider| {
                let stat = self.health.snapshot(provider);
                ProviderHealthView {
                    provider,
                    healthy: stat.as_ref().map(|s| s.healthy).unwrap_or(true),
                    last_check_ts: stat.as_ref().and_then(|s| s.last_activity_ts()),
                    ewma_latency_ms: stat.as_ref().map(|s| s.ewma_latency_ms).unwrap_or(0),
                    error_rate: stat.as_ref().map(|s| s.error_rate).unwrap_or(0.0),
                    breaker_state: self.breakers.state(provider).view(),
                    total_requests: stat.as_ref().map(|s| s.total_requests).unwrap_or(0),
                    successful_requests: stat
                        .as_ref()
                        .map(|s| s.successful_requests)
                        .unwrap_or(0),
                }
            })
            .collect()
    }

    /// The fixed degraded-mode response stream.
    pub fn offline_stream() -> DeltaStream {
        DeltaStream::from_deltas(vec![Delta::text(OFFLINE_MESSAGE), Delta::finished()])
    }

    // ==================== Entry points ====================

    /// Execute an intent, delivering the response as a delta stream.
    ///
    /// Returns an error for routing failures and, for non-chat capabilities,
    /// when every provider is exhausted before the first delta. Chat requests
    /// degrade to the offline stream instead.
    pub async fn execute_stream(self: &Arc<Self>, intent: RequestIntent) -> Result<DeltaStream> {
        let request_id = uuid::Uuid::new_v4();
        let capability = intent.capability;
        let chain = self.router.select(&intent)?;
        tracing::debug!(
            %request_id,
            providers = ?chain.providers,
            degraded = chain.degraded,
            "chain selected"
        );

        let (tx, rx) = mpsc::channel::<DriverEvent>(64);
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor
                .drive(chain, intent, tx)
                .instrument(tracing::debug_span!("request", %request_id))
                .await;
        });

        let mut rx = ReceiverStream::new(rx);
        match rx.next().await {
            Some(DriverEvent::Delta(first)) => {
                let rest = rx.filter_map(|event| async move {
                    match event {
                        DriverEvent::Delta(delta) => Some(delta),
                        DriverEvent::Exhausted(_) => None,
                    }
                });
                Ok(DeltaStream::new(Box::pin(
                    stream::iter(std::iter::once(first)).chain(rest),
                )))
            }
            Some(DriverEvent::Exhausted(error)) => {
                if capability == Capability::ChatCompletion {
                    tracing::warn!(%error, "chain exhausted, serving offline response");
                    Ok(Self::offline_stream())
                } else {
                    Err(error)
                }
            }
            None => {
                let error = RelayError::AllProvidersFailed {
                    capability,
                    last_kind: ErrorKind::Unknown,
                };
                if capability == Capability::ChatCompletion {
                    Ok(Self::offline_stream())
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Execute an intent and collect the response text.
    pub async fn execute_text(self: &Arc<Self>, intent: RequestIntent) -> Result<String> {
        self.execute_stream(intent).await?.collect_text().await
    }

    // ==================== Driver ====================

    async fn drive(&self, chain: Chain, intent: RequestIntent, tx: mpsc::Sender<DriverEvent>) {
        let mut last_kind = ErrorKind::ProviderUnavailable;

        if intent.race {
            match self.drive_race(&chain, &intent, &tx).await {
                RaceVerdict::Handled => return,
                RaceVerdict::NoWinner(kind) => {
                    if let Some(kind) = kind {
                        last_kind = kind;
                    }
                }
            }
        }

        for &provider in &chain.providers {
            let Some(adapter) = self.adapters.get(&provider).cloned() else {
                continue;
            };
            let config = self.config(provider);

            if !self.rpm.admit(provider, config.max_rpm) {
                tracing::warn!(%provider, "request-rate window exceeded, skipping");
                let now = now_ms();
                self.history.push(Attempt {
                    provider,
                    started_ts: now,
                    ended_ts: now,
                    outcome: AttemptOutcome::Retryable(ErrorKind::RateLimit),
                });
                last_kind = ErrorKind::RateLimit;
                continue;
            }

            if !self.breakers.may_request(provider) {
                tracing::debug!(%provider, "circuit open, skipping without HTTP");
                last_kind = ErrorKind::ProviderUnavailable;
                continue;
            }

            match self
                .run_provider_attempts(provider, &adapter, &config, &intent, &tx)
                .await
            {
                ProviderRun::Completed
                | ProviderRun::CallerGone
                | ProviderRun::MidStreamFailure => return,
                ProviderRun::Exhausted(kind) => {
                    last_kind = kind;
                }
            }
        }

        let _ = tx
            .send(DriverEvent::Exhausted(RelayError::AllProvidersFailed {
                capability: intent.capability,
                last_kind,
            }))
            .await;
    }

    async fn run_provider_attempts(
        &self,
        provider: ProviderId,
        adapter: &Arc<ProviderAdapter>,
        config: &ProviderConfig,
        intent: &RequestIntent,
        tx: &mpsc::Sender<DriverEvent>,
    ) -> ProviderRun {
        let mut last_kind = ErrorKind::Unknown;

        for attempt in 0..=self.policy.max_retries {
            let started_ts = now_ms();
            let started = Instant::now();
            let forwarded = Arc::new(AtomicU64::new(0));
            let budget = Duration::from_millis(config.timeout_ms as u64);

            let result = match timeout(
                budget,
                self.attempt_stream(adapter, intent, tx, &forwarded),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => AttemptResult::Failed(RelayError::provider(
                    adapter.name(),
                    ErrorKind::Timeout,
                    format!("attempt exceeded {} ms", config.timeout_ms),
                )),
            };

            let latency_ms = started.elapsed().as_millis() as u64;
            match result {
                AttemptResult::Completed => {
                    self.breakers.record_success(provider);
                    self.health.record(provider, true, latency_ms);
                    self.history.push(Attempt {
                        provider,
                        started_ts,
                        ended_ts: now_ms(),
                        outcome: AttemptOutcome::Success,
                    });
                    return ProviderRun::Completed;
                }
                AttemptResult::CallerGone => {
                    // Cancelled by the caller: accounted in history, never in
                    // health.
                    self.history.push(Attempt {
                        provider,
                        started_ts,
                        ended_ts: now_ms(),
                        outcome: AttemptOutcome::Cancelled,
                    });
                    return ProviderRun::CallerGone;
                }
                AttemptResult::Failed(error) => {
                    let kind = error.kind().unwrap_or(ErrorKind::Unknown);
                    tracing::warn!(%provider, attempt, %error, "attempt failed");
                    self.breakers.record_failure(provider);
                    self.health.record(provider, false, latency_ms);
                    self.history.push(Attempt {
                        provider,
                        started_ts,
                        ended_ts: now_ms(),
                        outcome: if kind.is_retryable() {
                            AttemptOutcome::Retryable(kind)
                        } else {
                            AttemptOutcome::Fatal(kind)
                        },
                    });
                    last_kind = kind;

                    if forwarded.load(Ordering::Relaxed) > 0 {
                        // Deltas already reached the caller; stream
                        // continuity forbids failing over, so terminate with
                        // an error-marked final delta.
                        let _ = tx
                            .send(DriverEvent::Delta(Delta::failed(kind, error.to_string())))
                            .await;
                        return ProviderRun::MidStreamFailure;
                    }

                    if !kind.is_retryable() || attempt == self.policy.max_retries {
                        break;
                    }
                    tokio::time::sleep(backoff::delay_for(
                        &self.policy,
                        kind,
                        attempt,
                        error.retry_after(),
                    ))
                    .await;
                }
            }
        }

        ProviderRun::Exhausted(last_kind)
    }

    /// One attempt: open the response and forward its deltas.
    async fn attempt_stream(
        &self,
        adapter: &Arc<ProviderAdapter>,
        intent: &RequestIntent,
        tx: &mpsc::Sender<DriverEvent>,
        forwarded: &Arc<AtomicU64>,
    ) -> AttemptResult {
        let response = match adapter.open_stream(intent).await {
            Ok(response) => response,
            Err(error) => return AttemptResult::Failed(error),
        };

        let wants_stream = intent.streaming && adapter.id().descriptor().streams_natively;
        if !wants_stream {
            // Single-shot body, surfaced as a two-delta sequence.
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(error) => {
                    return AttemptResult::Failed(classify_transport(adapter.name(), &error));
                }
            };
            let chat = match adapter.decode(&body) {
                Ok(chat) => chat,
                Err(error) => return AttemptResult::Failed(error),
            };

            let mut head = Delta::text(chat.content);
            if let Some(usage) = chat.usage {
                head = head.with_token_count(usage.completion_tokens);
            }
            return match self
                .forward(vec![head, Delta::finished()], tx, forwarded)
                .await
            {
                Forward::CallerGone => AttemptResult::CallerGone,
                _ => AttemptResult::Completed,
            };
        }

        let mut assembler = DeltaAssembler::new(Arc::clone(adapter));
        let mut bytes = response.bytes_stream();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    return AttemptResult::Failed(classify_transport(adapter.name(), &error));
                }
            };
            let deltas = match assembler.push(&chunk) {
                Ok(deltas) => deltas,
                Err(error) => return AttemptResult::Failed(error),
            };
            match self.forward(deltas, tx, forwarded).await {
                Forward::Continue => {}
                Forward::Done => return AttemptResult::Completed,
                Forward::CallerGone => return AttemptResult::CallerGone,
            }
        }

        // Clean close without a terminal marker: the assembler synthesizes
        // the final delta.
        match self.forward(assembler.finish(), tx, forwarded).await {
            Forward::CallerGone => AttemptResult::CallerGone,
            _ => AttemptResult::Completed,
        }
    }

    async fn forward(
        &self,
        deltas: Vec<Delta>,
        tx: &mpsc::Sender<DriverEvent>,
        forwarded: &Arc<AtomicU64>,
    ) -> Forward {
        for delta in deltas {
            let is_final = delta.is_final;
            if tx.send(DriverEvent::Delta(delta)).await.is_err() {
                return Forward::CallerGone;
            }
            forwarded.fetch_add(1, Ordering::Relaxed);
            if is_final {
                return Forward::Done;
            }
        }
        Forward::Continue
    }

    // ==================== Racing ====================

    /// Race the top healthy providers of the chain; winner-take-all on the
    /// first non-empty delta. Losing requests are dropped at claim time,
    /// which tears down their connections; they are recorded as cancelled
    /// attempts and never touch health statistics.
    async fn drive_race(
        &self,
        chain: &Chain,
        intent: &RequestIntent,
        tx: &mpsc::Sender<DriverEvent>,
    ) -> RaceVerdict {
        let mut racers: Vec<ProviderId> = chain
            .providers
            .iter()
            .copied()
            .filter(|&p| {
                self.health
                    .snapshot(p)
                    .map(|s| s.healthy)
                    .unwrap_or(true)
            })
            // Racing never consumes a half-open probe slot; only fully closed
            // breakers are raced.
            .filter(|&p| matches!(self.breakers.state(p), BreakerState::Closed))
            .collect();
        racers.truncate(self.policy.race_width);

        if racers.len() < 2 {
            return RaceVerdict::NoWinner(None);
        }
        racers.retain(|&p| self.rpm.admit(p, self.config(p).max_rpm));
        if racers.len() < 2 {
            return RaceVerdict::NoWinner(None);
        }

        tracing::debug!(?racers, "racing providers");
        let race_started_ts = now_ms();
        let race_started = Instant::now();

        let mut ids: Vec<ProviderId> = Vec::new();
        let mut heads: Vec<Pin<Box<dyn std::future::Future<Output = Result<RaceHead>> + Send>>> =
            Vec::new();
        for provider in racers {
            let Some(adapter) = self.adapters.get(&provider).cloned() else {
                continue;
            };
            let budget = Duration::from_millis(self.config(provider).timeout_ms as u64);
            let intent = intent.clone();
            ids.push(provider);
            heads.push(Box::pin(async move {
                match timeout(budget, open_until_first_content(adapter, intent)).await {
                    Ok(result) => result,
                    Err(_) => Err(RelayError::provider(
                        provider.name(),
                        ErrorKind::Timeout,
                        format!("no first token within {} ms", budget.as_millis()),
                    )),
                }
            }));
        }

        let mut last_kind = None;
        while !heads.is_empty() {
            let (result, index, remaining) = futures::future::select_all(heads).await;
            let provider = ids.remove(index);
            heads = remaining;

            match result {
                Ok(head) => {
                    // Claim: dropping the loser futures aborts their
                    // in-flight requests right now.
                    drop(heads);
                    let ended = now_ms();
                    for loser in ids {
                        tracing::debug!(provider = %loser, "race lost, connection dropped");
                        self.history.push(Attempt {
                            provider: loser,
                            started_ts: race_started_ts,
                            ended_ts: ended,
                            outcome: AttemptOutcome::Cancelled,
                        });
                    }

                    self.finish_race_winner(provider, head, race_started_ts, race_started, tx)
                        .await;
                    return RaceVerdict::Handled;
                }
                Err(error) => {
                    let kind = error.kind().unwrap_or(ErrorKind::Unknown);
                    tracing::warn!(%provider, %error, "racer failed before first token");
                    self.breakers.record_failure(provider);
                    self.health
                        .record(provider, false, race_started.elapsed().as_millis() as u64);
                    self.history.push(Attempt {
                        provider,
                        started_ts: race_started_ts,
                        ended_ts: now_ms(),
                        outcome: if kind.is_retryable() {
                            AttemptOutcome::Retryable(kind)
                        } else {
                            AttemptOutcome::Fatal(kind)
                        },
                    });
                    last_kind = Some(kind);
                }
            }
        }

        RaceVerdict::NoWinner(last_kind)
    }

    async fn finish_race_winner(
        &self,
        provider: ProviderId,
        head: RaceHead,
        started_ts: u64,
        started: Instant,
        tx: &mpsc::Sender<DriverEvent>,
    ) {
        let config = self.config(provider);
        let forwarded = Arc::new(AtomicU64::new(0));

        let mut initial = vec![head.first];
        initial.extend(head.pending);
        let already_done = initial.iter().any(|d| d.is_final);
        match self.forward(initial, tx, &forwarded).await {
            Forward::CallerGone => {
                self.history.push(Attempt {
                    provider,
                    started_ts,
                    ended_ts: now_ms(),
                    outcome: AttemptOutcome::Cancelled,
                });
                return;
            }
            Forward::Done => {}
            Forward::Continue => {}
        }

        let result = if already_done {
            AttemptResult::Completed
        } else {
            // The whole attempt shares one timeout budget; the head phase
            // already spent part of it.
            let budget = Duration::from_millis(config.timeout_ms as u64)
                .saturating_sub(started.elapsed());
            let mut assembler = head.assembler;
            let mut bytes = head.bytes;
            let adapter_name = provider.name();

            match timeout(budget, async {
                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(error) => {
                            return AttemptResult::Failed(classify_transport(
                                adapter_name,
                                &error,
                            ));
                        }
                    };
                    let deltas = match assembler.push(&chunk) {
                        Ok(deltas) => deltas,
                        Err(error) => return AttemptResult::Failed(error),
                    };
                    match self.forward(deltas, tx, &forwarded).await {
                        Forward::Continue => {}
                        Forward::Done => return AttemptResult::Completed,
                        Forward::CallerGone => return AttemptResult::CallerGone,
                    }
                }
                match self.forward(assembler.finish(), tx, &forwarded).await {
                    Forward::CallerGone => AttemptResult::CallerGone,
                    _ => AttemptResult::Completed,
                }
            })
            .await
            {
                Ok(result) => result,
                Err(_) => AttemptResult::Failed(RelayError::provider(
                    provider.name(),
                    ErrorKind::Timeout,
                    format!("attempt exceeded {} ms", config.timeout_ms),
                )),
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            AttemptResult::Completed => {
                self.breakers.record_success(provider);
                self.health.record(provider, true, latency_ms);
                self.history.push(Attempt {
                    provider,
                    started_ts,
                    ended_ts: now_ms(),
                    outcome: AttemptOutcome::Success,
                });
            }
            AttemptResult::CallerGone => {
                self.history.push(Attempt {
                    provider,
                    started_ts,
                    ended_ts: now_ms(),
                    outcome: AttemptOutcome::Cancelled,
                });
            }
            AttemptResult::Failed(error) => {
                let kind = error.kind().unwrap_or(ErrorKind::Unknown);
                tracing::warn!(%provider, %error, "race winner failed mid-stream");
                self.breakers.record_failure(provider);
                self.health.record(provider, false, latency_ms);
                self.history.push(Attempt {
                    provider,
                    started_ts,
                    ended_ts: now_ms(),
                    outcome: if kind.is_retryable() {
                        AttemptOutcome::Retryable(kind)
                    } else {
                        AttemptOutcome::Fatal(kind)
                    },
                });
                // Winner-take-all: no failover once the race is claimed.
                let _ = tx
                    .send(DriverEvent::Delta(Delta::failed(kind, error.to_string())))
                    .await;
            }
        }
    }
}

/// A racer that has produced its first meaningful delta, plus everything
/// needed to keep draining its stream.
struct RaceHead {
    first: Delta,
    pending: VecDeque<Delta>,
    assembler: DeltaAssembler,
    bytes: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
}

/// Open a stream and read until the first non-empty (or final) delta.
async fn open_until_first_content(
    adapter: Arc<ProviderAdapter>,
    intent: RequestIntent,
) -> Result<RaceHead> {
    let response = adapter.open_stream(&intent).await?;
    let mut assembler = DeltaAssembler::new(Arc::clone(&adapter));
    let mut bytes: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>> =
        Box::pin(response.bytes_stream());

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk.map_err(|e| classify_transport(adapter.name(), &e))?;
        let mut deltas: VecDeque<Delta> = assembler.push(&chunk)?.into();
        while let Some(delta) = deltas.pop_front() {
            if !delta.content.is_empty() || delta.is_final {
                return Ok(RaceHead {
                    first: delta,
                    pending: deltas,
                    assembler,
                    bytes,
                });
            }
        }
    }

    let mut tail: VecDeque<Delta> = assembler.finish().into();
    let first = tail.pop_front().unwrap_or_else(Delta::finished);
    Ok(RaceHead {
        first,
        pending: tail,
        assembler,
        bytes,
    })
}

fn classify_transport(provider: &'static str, error: &reqwest::Error) -> RelayError {
    let kind = if error.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::Network
    };
    RelayError::provider(provider, kind, error.to_string())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
