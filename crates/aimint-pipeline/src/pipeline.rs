use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use aimint_chain::{ChainContext, ConfirmationPolicy, MintExecutor, Signer};
use aimint_store::MetadataStore;
use aimint_synth::ImageSynthesisClient;
use aimint_types::{
    CreationRequest, FailureCause, ImageAsset, MetadataRecord, PipelineState, ProgressEvent,
    RunId, Stage,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::failure::{self, IntoFailureCause};
use crate::report::{RunReport, StageRecord};

// ---------------------------------------------------------------------------
// AssetPipeline
// ---------------------------------------------------------------------------

/// Drives generate -> store -> mint for one request at a time.
///
/// Cloning is cheap and every clone observes the same state. A second
/// request while one is in flight is refused with
/// [`PipelineError::Busy`]. Each stage is attempted exactly once per run;
/// a failed stage ends the run in `Failed` and leaves earlier side effects
/// (an uploaded bundle) in place.
#[derive(Clone)]
pub struct AssetPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    synth: Arc<dyn ImageSynthesisClient>,
    store: Arc<dyn MetadataStore>,
    minter: Arc<dyn MintExecutor>,
    signer: Arc<dyn Signer>,
    config: PipelineConfig,
    state: Mutex<PipelineState>,
    image: Mutex<Option<ImageAsset>>,
    events: broadcast::Sender<ProgressEvent>,
}

impl AssetPipeline {
    pub fn new(
        synth: Arc<dyn ImageSynthesisClient>,
        store: Arc<dyn MetadataStore>,
        minter: Arc<dyn MintExecutor>,
        signer: Arc<dyn Signer>,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                synth,
                store,
                minter,
                signer,
                config,
                state: Mutex::new(PipelineState::Idle),
                image: Mutex::new(None),
                events,
            }),
        }
    }

    /// Build a pipeline that mints through `chain`'s contract with
    /// `chain`'s signer.
    pub fn from_chain(
        synth: Arc<dyn ImageSynthesisClient>,
        store: Arc<dyn MetadataStore>,
        chain: &ChainContext,
        confirmation: ConfirmationPolicy,
        config: PipelineConfig,
    ) -> Self {
        let minter = Arc::new(chain.mint_executor(confirmation));
        Self::new(synth, store, minter, chain.signer(), config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Receive a [`ProgressEvent`] for every transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.inner.state.lock().expect("lock poisoned").clone()
    }

    /// The image of the current or last run, available as soon as the
    /// image stage succeeds regardless of later outcomes.
    pub fn latest_image(&self) -> Option<ImageAsset> {
        self.inner.image.lock().expect("lock poisoned").clone()
    }

    /// Return a finished pipeline to `Idle`.
    pub fn reset(&self) -> PipelineResult<()> {
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.is_busy() {
                return Err(PipelineError::Busy { state: state.name() });
            }
            *state = PipelineState::Idle;
        }
        *self.inner.image.lock().expect("lock poisoned") = None;
        debug!("pipeline reset");
        Ok(())
    }

    /// Validate `request` and claim the pipeline for it.
    ///
    /// On success the state is already `GeneratingImage`; the stages run
    /// when the returned [`PendingRun`] is executed. Validation failures
    /// leave the state untouched and make no network call.
    pub fn start(&self, request: CreationRequest) -> PipelineResult<PendingRun> {
        request.validate()?;

        let run_id = RunId::new();
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.is_busy() {
                return Err(PipelineError::Busy { state: state.name() });
            }
            *state = PipelineState::GeneratingImage;
            *self.inner.image.lock().expect("lock poisoned") = None;
            self.inner
                .emit(ProgressEvent::new(run_id, PipelineState::GeneratingImage));
        }
        info!(run_id = %run_id, name = %request.name, "run started");

        Ok(PendingRun {
            inner: self.inner.clone(),
            run_id,
            request,
            settled: false,
        })
    }

    /// Validate, claim and execute in one call.
    ///
    /// `Err` only when the request is refused; stage failures come back as
    /// a report whose state is `Failed`.
    pub async fn run(&self, request: CreationRequest) -> PipelineResult<RunReport> {
        Ok(self.start(request)?.execute().await)
    }
}

impl std::fmt::Debug for AssetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPipeline")
            .field("synth", &self.inner.synth.name())
            .field("store", &self.inner.store.name())
            .field("signer", &self.inner.signer.address())
            .field("config", &self.inner.config)
            .field("state", &self.state().name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    /// Callers hold the state lock so events leave in state order.
    fn emit(&self, event: ProgressEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn transition(&self, run_id: RunId, next: PipelineState, image: Option<ImageAsset>) {
        let mut state = self.state.lock().expect("lock poisoned");
        debug_assert!(
            state.can_transition_to(&next),
            "illegal transition {} -> {}",
            *state,
            next
        );
        *state = next.clone();
        let event = ProgressEvent::new(run_id, next);
        self.emit(match image {
            Some(image) => event.with_image(image),
            None => event,
        });
    }

    /// Run one stage under the configured timeout and record its outcome.
    async fn stage<T, F>(
        &self,
        stage: Stage,
        records: &mut Vec<StageRecord>,
        work: F,
    ) -> Result<T, FailureCause>
    where
        F: Future<Output = Result<T, FailureCause>>,
    {
        let started = Instant::now();
        let outcome = match self.config.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(failure::stage_timeout(stage, limit)),
            },
            None => work.await,
        };
        let elapsed = started.elapsed();

        match &outcome {
            Ok(_) => info!(stage = %stage, ?elapsed, "stage passed"),
            Err(cause) => warn!(
                stage = %stage,
                kind = %cause.kind,
                ?elapsed,
                error = %cause.message,
                "stage failed"
            ),
        }
        records.push(StageRecord {
            stage,
            passed: outcome.is_ok(),
            reason: outcome.as_ref().err().map(|c| c.to_string()),
            elapsed,
        });
        outcome
    }
}

// ---------------------------------------------------------------------------
// PendingRun
// ---------------------------------------------------------------------------

/// A validated request holding the pipeline's single run slot.
///
/// Dropping it (or the future returned by [`PendingRun::execute`]) before
/// the run settles moves the pipeline to `Failed` with an `Aborted` cause,
/// freeing it for the next request.
pub struct PendingRun {
    inner: Arc<Inner>,
    run_id: RunId,
    request: CreationRequest,
    settled: bool,
}

impl PendingRun {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn request(&self) -> &CreationRequest {
        &self.request
    }

    /// Execute the three stages in order.
    pub async fn execute(mut self) -> RunReport {
        let started = Instant::now();
        let mut records = Vec::with_capacity(Stage::ALL.len());
        let state = self.drive(&mut records).await;
        self.settled = true;

        info!(run_id = %self.run_id, state = %state, elapsed = ?started.elapsed(), "run finished");
        RunReport {
            run_id: self.run_id,
            state,
            stages: records,
            elapsed: started.elapsed(),
        }
    }

    async fn drive(&self, records: &mut Vec<StageRecord>) -> PipelineState {
        let inner = &self.inner;
        let run_id = self.run_id;

        let image = match inner
            .stage(Stage::Image, records, async {
                inner
                    .synth
                    .synthesize(self.request.prompt())
                    .await
                    .map_err(|e| e.failure_cause())
            })
            .await
        {
            Ok(image) => image,
            Err(cause) => return self.fail(Stage::Image, cause),
        };
        *inner.image.lock().expect("lock poisoned") = Some(image.clone());
        inner.transition(run_id, PipelineState::UploadingMetadata, Some(image.clone()));

        let record = MetadataRecord::new(&self.request, image.clone());
        let receipt = match inner
            .stage(Stage::Storage, records, async {
                inner.store.store(&record).await.map_err(|e| e.failure_cause())
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(cause) => return self.fail(Stage::Storage, cause),
        };
        info!(run_id = %run_id, uri = %receipt.metadata_uri, "metadata stored");
        inner.transition(run_id, PipelineState::AwaitingMint, None);

        let price = inner.config.mint_price_wei;
        let tx_hash = match inner
            .stage(Stage::Mint, records, async {
                match inner
                    .minter
                    .mint(&receipt.metadata_uri, inner.signer.as_ref(), price)
                    .await
                {
                    Ok(minted) if minted.confirmed => Ok(minted.tx_hash),
                    Ok(pending) => Err(failure::unconfirmed(&pending.tx_hash)),
                    Err(e) => Err(e.failure_cause()),
                }
            })
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(cause) => return self.fail(Stage::Mint, cause),
        };

        let completed = PipelineState::Completed {
            image,
            metadata_uri: receipt.metadata_uri,
            tx_hash,
        };
        inner.transition(run_id, completed.clone(), None);
        completed
    }

    fn fail(&self, stage: Stage, cause: FailureCause) -> PipelineState {
        let failed = PipelineState::Failed { stage, cause };
        self.inner.transition(self.run_id, failed.clone(), None);
        failed
    }
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if let Some(stage) = state.active_stage() {
            let failed = PipelineState::Failed {
                stage,
                cause: failure::aborted(stage),
            };
            *state = failed.clone();
            warn!(run_id = %self.run_id, state = %failed, "run dropped before completion");
            self.inner.emit(ProgressEvent::new(self.run_id, failed));
        }
    }
}

impl std::fmt::Debug for PendingRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRun")
            .field("run_id", &self.run_id)
            .field("request", &self.request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aimint_chain::{
        Address, ChainError, ChainResult, MintError, MintResult, TransactionRequest, TxHash, U256,
    };
    use aimint_store::{StorageError, StoreResult};
    use aimint_synth::{SynthError, SynthResult};
    use aimint_types::{FailureKind, MintReceipt, SpendOutcome, StorageReceipt};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    fn calls(log: &CallLog) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    struct MockSynth {
        log: CallLog,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ImageSynthesisClient for MockSynth {
        fn name(&self) -> &str {
            "mock-synth"
        }

        async fn synthesize(&self, _prompt: &str) -> SynthResult<ImageAsset> {
            self.log.lock().unwrap().push("synthesize");
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(SynthError::Remote {
                    status: 503,
                    body: "model loading".into(),
                });
            }
            Ok(ImageAsset::new(b"ABC".to_vec(), "image/png"))
        }
    }

    struct MockStore {
        log: CallLog,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl MetadataStore for MockStore {
        fn name(&self) -> &str {
            "mock-store"
        }

        async fn store(&self, _record: &MetadataRecord) -> StoreResult<StorageReceipt> {
            self.log.lock().unwrap().push("store");
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(StorageError::Rejected {
                    status: 500,
                    message: "pin failed".into(),
                });
            }
            Ok(StorageReceipt::new("ipfs://cid/metadata.json", "cid"))
        }
    }

    #[derive(Clone, Copy)]
    enum MintOutcome {
        Confirmed,
        Pending,
        Revert,
    }

    struct MockMinter {
        log: CallLog,
        outcome: MintOutcome,
        gate: Option<Arc<Notify>>,
        seen: Mutex<Option<(String, U256)>>,
    }

    #[async_trait]
    impl MintExecutor for MockMinter {
        async fn mint(
            &self,
            token_uri: &str,
            _signer: &dyn Signer,
            price_wei: U256,
        ) -> MintResult<MintReceipt> {
            self.log.lock().unwrap().push("mint");
            *self.seen.lock().unwrap() = Some((token_uri.to_string(), price_wei));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.outcome {
                MintOutcome::Confirmed => Ok(MintReceipt::confirmed("0xdead")),
                MintOutcome::Pending => Ok(MintReceipt::pending("0xbeef")),
                MintOutcome::Revert => Err(MintError::Reverted {
                    tx_hash: "0xdead".into(),
                }),
            }
        }
    }

    struct MockSigner;

    #[async_trait]
    impl Signer for MockSigner {
        fn address(&self) -> Address {
            Address::ZERO
        }

        async fn send_transaction(&self, _tx: TransactionRequest) -> ChainResult<TxHash> {
            Err(ChainError::NoAccounts)
        }
    }

    struct Harness {
        pipeline: AssetPipeline,
        log: CallLog,
        minter: Arc<MockMinter>,
    }

    struct Setup {
        synth_fails: bool,
        store_fails: bool,
        mint: MintOutcome,
        /// Holds the `gated` stage until notified.
        gate: Option<Arc<Notify>>,
        gated: Stage,
        config: PipelineConfig,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                synth_fails: false,
                store_fails: false,
                mint: MintOutcome::Confirmed,
                gate: None,
                gated: Stage::Image,
                config: PipelineConfig::default(),
            }
        }
    }

    fn harness(setup: Setup) -> Harness {
        let log: CallLog = Arc::default();
        let gate_for = |stage: Stage| setup.gate.clone().filter(|_| setup.gated == stage);
        let minter = Arc::new(MockMinter {
            log: log.clone(),
            outcome: setup.mint,
            gate: gate_for(Stage::Mint),
            seen: Mutex::new(None),
        });
        let pipeline = AssetPipeline::new(
            Arc::new(MockSynth {
                log: log.clone(),
                fail: setup.synth_fails,
                gate: gate_for(Stage::Image),
            }),
            Arc::new(MockStore {
                log: log.clone(),
                fail: setup.store_fails,
                gate: gate_for(Stage::Storage),
            }),
            minter.clone(),
            Arc::new(MockSigner),
            setup.config,
        );
        Harness {
            pipeline,
            log,
            minter,
        }
    }

    fn request() -> CreationRequest {
        CreationRequest::new("Foo", "Bar")
    }

    async fn wait_for(pipeline: &AssetPipeline, state: &PipelineState) {
        for _ in 0..200 {
            if pipeline.state() == *state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pipeline never reached {state}, stuck in {}", pipeline.state());
    }

    fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn successful_run_visits_every_state_in_order() {
        let h = harness(Setup::default());
        let mut rx = h.pipeline.subscribe();
        assert_eq!(h.pipeline.state(), PipelineState::Idle);

        let report = h.pipeline.run(request()).await.unwrap();

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.stage_name()).collect();
        assert_eq!(
            names,
            vec!["generating_image", "uploading_metadata", "awaiting_mint", "completed"]
        );
        assert!(report.is_completed());
        assert_eq!(report.stages.len(), 3);
        assert!(report.stages.iter().all(|s| s.passed));
        let order: Vec<_> = report.stages.iter().map(|s| s.stage).collect();
        assert_eq!(order, Stage::ALL.to_vec());
    }

    #[tokio::test]
    async fn fixed_outputs_complete_with_three_calls() {
        let h = harness(Setup::default());
        let report = h.pipeline.run(request()).await.unwrap();

        assert_eq!(calls(&h.log), vec!["synthesize", "store", "mint"]);
        match &report.state {
            PipelineState::Completed {
                image,
                metadata_uri,
                tx_hash,
            } => {
                assert_eq!(&image.bytes[..], b"ABC");
                assert_eq!(metadata_uri, "ipfs://cid/metadata.json");
                assert_eq!(tx_hash, "0xdead");
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(h.pipeline.state(), report.state);

        let (uri, price) = h.minter.seen.lock().unwrap().clone().unwrap();
        assert_eq!(uri, "ipfs://cid/metadata.json");
        assert_eq!(price, PipelineConfig::default().mint_price_wei);
    }

    #[tokio::test]
    async fn empty_fields_rejected_without_network_calls() {
        let h = harness(Setup::default());
        let mut rx = h.pipeline.subscribe();
        for bad in [CreationRequest::new("", "Bar"), CreationRequest::new("Foo", "  ")] {
            let err = h.pipeline.run(bad).await.unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)));
        }
        assert!(calls(&h.log).is_empty());
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn synthesis_failure_stops_before_storage() {
        let h = harness(Setup {
            synth_fails: true,
            ..Setup::default()
        });
        let report = h.pipeline.run(request()).await.unwrap();
        assert_eq!(calls(&h.log), vec!["synthesize"]);
        assert_eq!(report.failed_stage(), Some(Stage::Image));
        assert_eq!(report.stages.len(), 1);
        match &report.state {
            PipelineState::Failed { cause, .. } => {
                assert_eq!(cause.kind, FailureKind::Synthesis);
                assert_eq!(cause.spend, SpendOutcome::NothingSpent);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert!(h.pipeline.latest_image().is_none());
    }

    #[tokio::test]
    async fn storage_failure_never_mints() {
        let h = harness(Setup {
            store_fails: true,
            ..Setup::default()
        });
        let report = h.pipeline.run(request()).await.unwrap();
        assert_eq!(calls(&h.log), vec!["synthesize", "store"]);
        assert_eq!(report.failed_stage(), Some(Stage::Storage));
        assert!(!report.stages[1].passed);
        assert!(report.stages[1].reason.as_deref().unwrap_or("").contains("pin failed"));
        // The image stays available even though the run failed.
        assert_eq!(&h.pipeline.latest_image().unwrap().bytes[..], b"ABC");
    }

    #[tokio::test]
    async fn reverted_mint_reports_gas_risk() {
        let h = harness(Setup {
            mint: MintOutcome::Revert,
            ..Setup::default()
        });
        let report = h.pipeline.run(request()).await.unwrap();
        match &report.state {
            PipelineState::Failed { stage, cause } => {
                assert_eq!(*stage, Stage::Mint);
                assert_eq!(cause.kind, FailureKind::Mint);
                assert_eq!(cause.spend, SpendOutcome::GasMayBeSpent);
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pending_mint_is_unconfirmed_failure() {
        let h = harness(Setup {
            mint: MintOutcome::Pending,
            ..Setup::default()
        });
        let report = h.pipeline.run(request()).await.unwrap();
        match &report.state {
            PipelineState::Failed { stage, cause } => {
                assert_eq!(*stage, Stage::Mint);
                assert_eq!(cause.kind, FailureKind::Unconfirmed);
                assert_eq!(
                    cause.spend,
                    SpendOutcome::TransactionLive {
                        tx_hash: "0xbeef".into()
                    }
                );
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(calls(&h.log), vec!["synthesize", "store", "mint"]);
    }

    #[tokio::test]
    async fn second_run_while_busy_is_refused() {
        let gate = Arc::new(Notify::new());
        let h = harness(Setup {
            gate: Some(gate.clone()),
            ..Setup::default()
        });

        let pending = h.pipeline.start(request()).unwrap();
        let task = tokio::spawn(pending.execute());

        let err = h.pipeline.run(CreationRequest::new("Other", "Thing")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Busy { .. }));
        assert_eq!(h.pipeline.state(), PipelineState::GeneratingImage);
        assert!(matches!(h.pipeline.reset(), Err(PipelineError::Busy { .. })));

        gate.notify_one();
        let report = task.await.unwrap();
        assert!(report.is_completed());
        assert_eq!(calls(&h.log), vec!["synthesize", "store", "mint"]);
    }

    #[tokio::test]
    async fn busy_in_every_stage() {
        for (gated, busy_state) in [
            (Stage::Storage, PipelineState::UploadingMetadata),
            (Stage::Mint, PipelineState::AwaitingMint),
        ] {
            let gate = Arc::new(Notify::new());
            let h = harness(Setup {
                gate: Some(gate.clone()),
                gated,
                ..Setup::default()
            });
            let task = tokio::spawn(h.pipeline.start(request()).unwrap().execute());
            wait_for(&h.pipeline, &busy_state).await;

            let err = h.pipeline.run(CreationRequest::new("Other", "Thing")).await.unwrap_err();
            assert!(
                matches!(err, PipelineError::Busy { state } if state == busy_state.name()),
                "{gated}: {err:?}"
            );
            assert_eq!(h.pipeline.state(), busy_state);

            gate.notify_one();
            assert!(task.await.unwrap().is_completed());
            assert_eq!(calls(&h.log), vec!["synthesize", "store", "mint"]);
        }
    }

    #[tokio::test]
    async fn failure_is_announced_with_its_stage() {
        for (setup, failed_at) in [
            (
                Setup {
                    synth_fails: true,
                    ..Setup::default()
                },
                Stage::Image,
            ),
            (
                Setup {
                    store_fails: true,
                    ..Setup::default()
                },
                Stage::Storage,
            ),
            (
                Setup {
                    mint: MintOutcome::Revert,
                    ..Setup::default()
                },
                Stage::Mint,
            ),
        ] {
            let h = harness(setup);
            let mut rx = h.pipeline.subscribe();
            let report = h.pipeline.run(request()).await.unwrap();

            let events = drain(&mut rx);
            let last = events.last().unwrap();
            match &last.state {
                PipelineState::Failed { stage, .. } => assert_eq!(*stage, failed_at),
                other => panic!("unexpected final event: {other:?}"),
            }
            assert_eq!(last.state, report.state);
            assert_eq!(last.run_id, report.run_id);
            assert_eq!(events.len(), Stage::ALL.iter().position(|s| *s == failed_at).unwrap() + 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn events_follow_state_order_under_contention() {
        let h = harness(Setup {
            config: PipelineConfig {
                event_capacity: 4096,
                ..PipelineConfig::default()
            },
            ..Setup::default()
        });
        let mut rx = h.pipeline.subscribe();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = h.pipeline.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let _ = pipeline.run(request()).await;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap();
        }

        // A run's events must never interleave with the next run's.
        let mut open: Option<RunId> = None;
        for event in drain(&mut rx) {
            if event.state == PipelineState::GeneratingImage {
                assert!(open.is_none(), "run started before {open:?} settled");
                open = Some(event.run_id);
            } else {
                assert_eq!(open, Some(event.run_id));
                if event.state.is_terminal() {
                    open = None;
                }
            }
        }
        assert!(open.is_none());
    }

    #[tokio::test]
    async fn repeated_invalid_requests_leave_no_residue() {
        let h = harness(Setup::default());
        assert!(h.pipeline.run(CreationRequest::new("", "")).await.is_err());
        assert!(h.pipeline.run(CreationRequest::new("", "")).await.is_err());
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert!(h.pipeline.run(request()).await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn new_run_after_failure() {
        let h = harness(Setup {
            store_fails: true,
            ..Setup::default()
        });
        let first = h.pipeline.run(request()).await.unwrap();
        assert_eq!(first.failed_stage(), Some(Stage::Storage));
        let second = h.pipeline.run(request()).await.unwrap();
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(calls(&h.log), vec!["synthesize", "store", "synthesize", "store"]);
    }

    #[tokio::test]
    async fn uploading_event_carries_image() {
        let h = harness(Setup {
            store_fails: true,
            ..Setup::default()
        });
        let mut rx = h.pipeline.subscribe();
        h.pipeline.run(request()).await.unwrap();
        let events = drain(&mut rx);
        let uploading = events
            .iter()
            .find(|e| e.state == PipelineState::UploadingMetadata)
            .unwrap();
        assert_eq!(&uploading.image.as_ref().unwrap().bytes[..], b"ABC");
        assert_eq!(uploading.message, "Uploading Image...");
        assert!(events.iter().all(|e| e.run_id == events[0].run_id));
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let h = harness(Setup::default());
        h.pipeline.run(request()).await.unwrap();
        assert!(h.pipeline.latest_image().is_some());
        h.pipeline.reset().unwrap();
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert!(h.pipeline.latest_image().is_none());
    }

    #[tokio::test]
    async fn dropped_run_is_aborted() {
        let h = harness(Setup::default());
        let pending = h.pipeline.start(request()).unwrap();
        drop(pending);
        match h.pipeline.state() {
            PipelineState::Failed { stage, cause } => {
                assert_eq!(stage, Stage::Image);
                assert_eq!(cause.kind, FailureKind::Aborted);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert!(calls(&h.log).is_empty());
        assert!(h.pipeline.run(request()).await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn cancelled_task_frees_pipeline() {
        let gate = Arc::new(Notify::new());
        let h = harness(Setup {
            gate: Some(gate),
            ..Setup::default()
        });
        let task = tokio::spawn(h.pipeline.start(request()).unwrap().execute());
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(h.pipeline.state().is_terminal());
        assert!(h.pipeline.reset().is_ok());
    }

    #[tokio::test]
    async fn stage_timeout_fails_the_stage() {
        let h = harness(Setup {
            gate: Some(Arc::new(Notify::new())),
            config: PipelineConfig::default().with_stage_timeout(Duration::from_millis(30)),
            ..Setup::default()
        });
        let report = h.pipeline.run(request()).await.unwrap();
        match &report.state {
            PipelineState::Failed { stage, cause } => {
                assert_eq!(*stage, Stage::Image);
                assert_eq!(cause.kind, FailureKind::Timeout);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(calls(&h.log), vec!["synthesize"]);
    }
}
