//! Two-stage background inspection.
//!
//! Documents enter through an [`InspectionQueue`] and are picked up by a pool
//! of inspection workers, which run the [`LinterRegistry`] and pass the
//! updated document on through a second bounded queue to a pool of
//! persistence workers. Persistence goes through an [`InspectionSink`] and
//! never re-enqueues.
//!
//! Both queues hold twice as many items as their consuming pool has workers.
//! A full queue blocks its producer.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::lint::LinterRegistry;
use crate::models::{DocId, Document};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub inspection_workers: usize,
    pub persistence_workers: usize,
    /// How long `enqueue` may wait for room. `None` waits indefinitely.
    pub enqueue_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inspection_workers: 4,
            persistence_workers: 4,
            enqueue_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn inspection_capacity(&self) -> usize {
        2 * self.inspection_workers.max(1)
    }

    pub fn result_capacity(&self) -> usize {
        2 * self.persistence_workers.max(1)
    }
}

/// What became of an inspection result handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBack {
    Written,
    /// The document changed after it was inspected; the result was dropped.
    Stale { inspected: i64, current: i64 },
    /// The document was deleted in the meantime.
    Missing,
    /// The owner may not write the document (anonymous owner, default below edit).
    Refused,
}

/// Destination of inspection results.
#[async_trait]
pub trait InspectionSink: Send + Sync {
    async fn write_back(&self, doc: Document) -> Result<WriteBack>;
}

/// Producer side of the inspection queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InspectionQueue {
    tx: flume::Sender<Document>,
    closed: CancellationToken,
    timeout: Option<Duration>,
}

/// Consumer side of the inspection queue, handed to [`InspectionPipeline::start`].
#[derive(Debug)]
pub struct InspectionIntake {
    rx: flume::Receiver<Document>,
    closed: CancellationToken,
    config: PipelineConfig,
}

/// Creates the inspection queue. The producer goes to the document service,
/// the intake to the pipeline, which lets the two be built independently.
pub fn inspection_queue(config: &PipelineConfig) -> (InspectionQueue, InspectionIntake) {
    let (tx, rx) = flume::bounded(config.inspection_capacity());
    let closed = CancellationToken::new();
    let queue = InspectionQueue {
        tx,
        closed: closed.clone(),
        timeout: config.enqueue_timeout,
    };
    let intake = InspectionIntake {
        rx,
        closed,
        config: config.clone(),
    };
    (queue, intake)
}

impl InspectionQueue {
    /// Queues `doc` for inspection, waiting while the queue is full.
    ///
    /// Fails with `Unavailable` once the pipeline shuts down, or when the
    /// configured timeout passes before room frees up.
    pub async fn enqueue(&self, doc: Document) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::Unavailable("inspection queue is shut down".to_string()));
        }

        let doc_id = doc.id;
        let send = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, self.tx.send_async(doc)).await {
                    Ok(sent) => sent.map_err(|_| closed_error()),
                    Err(_) => Err(Error::Unavailable(format!(
                        "inspection queue full for {}ms",
                        limit.as_millis()
                    ))),
                },
                None => self.tx.send_async(doc).await.map_err(|_| closed_error()),
            }
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error()),
            sent = send => {
                if sent.is_ok() {
                    tracing::debug!(doc_id, "Queued for inspection");
                }
                sent
            }
        }
    }

    /// Number of documents waiting for an inspection worker.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tx.len()
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

fn closed_error() -> Error {
    Error::Unavailable("inspection queue is shut down".to_string())
}

/// Running worker pools.
pub struct InspectionPipeline {
    closed: CancellationToken,
    inspectors: Vec<JoinHandle<()>>,
    persisters: Vec<JoinHandle<()>>,
}

impl InspectionPipeline {
    /// Spawns both worker pools on the current tokio runtime.
    pub fn start(
        intake: InspectionIntake,
        registry: Arc<LinterRegistry>,
        sink: Arc<dyn InspectionSink>,
    ) -> Self {
        let InspectionIntake { rx, closed, config } = intake;
        let (result_tx, result_rx) = flume::bounded(config.result_capacity());

        let inspectors = (0..config.inspection_workers.max(1))
            .map(|worker| {
                tokio::spawn(inspect_worker(
                    worker,
                    rx.clone(),
                    result_tx.clone(),
                    registry.clone(),
                    closed.clone(),
                ))
            })
            .collect();
        // Persisters stop once every inspector has dropped its sender.
        drop(result_tx);

        let persisters = (0..config.persistence_workers.max(1))
            .map(|worker| tokio::spawn(persist_worker(worker, result_rx.clone(), sink.clone())))
            .collect();

        tracing::info!(
            inspection_workers = config.inspection_workers,
            persistence_workers = config.persistence_workers,
            "Inspection pipeline started"
        );

        Self {
            closed,
            inspectors,
            persisters,
        }
    }

    /// Stops accepting work, lets the workers drain both queues and waits
    /// for them to exit.
    pub async fn shutdown(self) {
        tracing::info!("Inspection pipeline shutting down");
        self.closed.cancel();

        for result in futures::future::join_all(self.inspectors).await {
            if let Err(e) = result {
                tracing::error!("Inspection worker failed: {}", e);
            }
        }
        for result in futures::future::join_all(self.persisters).await {
            if let Err(e) = result {
                tracing::error!("Persistence worker failed: {}", e);
            }
        }

        tracing::info!("Inspection pipeline stopped");
    }
}

async fn inspect_worker(
    worker: usize,
    rx: flume::Receiver<Document>,
    results: flume::Sender<Document>,
    registry: Arc<LinterRegistry>,
    closed: CancellationToken,
) {
    loop {
        let doc = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            doc = rx.recv_async() => match doc {
                Ok(doc) => doc,
                Err(_) => return,
            },
        };
        if !inspect_one(worker, doc, &results, &registry).await {
            return;
        }
    }

    // Drain whatever was queued before shutdown.
    while let Ok(doc) = rx.try_recv() {
        if !inspect_one(worker, doc, &results, &registry).await {
            return;
        }
    }
}

/// Returns `false` when the persistence side is gone.
async fn inspect_one(
    worker: usize,
    doc: Document,
    results: &flume::Sender<Document>,
    registry: &LinterRegistry,
) -> bool {
    let doc_id = doc.id;
    let inspected = registry.inspect(doc).await;
    tracing::debug!(worker, doc_id, status = %inspected.lint_status, "Inspected");

    if results.send_async(inspected).await.is_err() {
        tracing::warn!(worker, doc_id, "Persistence workers gone, dropping result");
        return false;
    }
    true
}

async fn persist_worker(
    worker: usize,
    rx: flume::Receiver<Document>,
    sink: Arc<dyn InspectionSink>,
) {
    while let Ok(doc) = rx.recv_async().await {
        let doc_id: DocId = doc.id;
        match sink.write_back(doc).await {
            Ok(WriteBack::Written) => tracing::debug!(worker, doc_id, "Lint status stored"),
            Ok(WriteBack::Stale { inspected, current }) => tracing::warn!(
                worker,
                doc_id,
                inspected,
                current,
                "Dropping stale inspection result"
            ),
            Ok(WriteBack::Missing) => {
                tracing::debug!(worker, doc_id, "Document deleted before write-back")
            }
            Ok(WriteBack::Refused) => {
                tracing::warn!(worker, doc_id, "Owner may not edit document, result dropped")
            }
            Err(e) => tracing::warn!(worker, doc_id, "Write-back failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::{LintError, Linter, StubLinter};
    use crate::models::AccessLevel;
    use tokio::sync::Semaphore;

    struct RecordingSink {
        tx: flume::Sender<Document>,
    }

    #[async_trait]
    impl InspectionSink for RecordingSink {
        async fn write_back(&self, doc: Document) -> Result<WriteBack> {
            let _ = self.tx.send(doc);
            Ok(WriteBack::Written)
        }
    }

    /// Reports when it starts and then waits for a permit.
    struct GatedLinter {
        started: flume::Sender<()>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Linter for GatedLinter {
        async fn inspect(&self, _code: &str) -> std::result::Result<String, LintError> {
            let _ = self.started.send(());
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            Ok("gated".to_string())
        }
    }

    fn doc(id: DocId, lang: &str) -> Document {
        Document {
            id,
            owner: Some(1),
            text: format!("body {}", id),
            lang: lang.to_string(),
            access: AccessLevel::None,
            lint_status: "No inspection".to_string(),
            version: 1,
        }
    }

    fn config(workers: usize, timeout: Option<Duration>) -> PipelineConfig {
        PipelineConfig {
            inspection_workers: workers,
            persistence_workers: workers,
            enqueue_timeout: timeout,
        }
    }

    fn recording_sink() -> (Arc<dyn InspectionSink>, flume::Receiver<Document>) {
        let (tx, rx) = flume::unbounded();
        (Arc::new(RecordingSink { tx }), rx)
    }

    struct Gated {
        queue: InspectionQueue,
        pipeline: InspectionPipeline,
        started: flume::Receiver<()>,
        gate: Arc<Semaphore>,
        written: flume::Receiver<Document>,
    }

    fn gated_pipeline(timeout: Option<Duration>) -> Gated {
        let (started_tx, started) = flume::unbounded();
        let gate = Arc::new(Semaphore::new(0));
        let mut registry = LinterRegistry::new();
        registry.register(
            "go",
            Arc::new(GatedLinter {
                started: started_tx,
                gate: gate.clone(),
            }),
        );
        let (sink, written) = recording_sink();
        let (queue, intake) = inspection_queue(&config(1, timeout));
        let pipeline = InspectionPipeline::start(intake, Arc::new(registry), sink);
        Gated {
            queue,
            pipeline,
            started,
            gate,
            written,
        }
    }

    #[test]
    fn test_capacities_are_twice_the_pool() {
        let config = PipelineConfig {
            inspection_workers: 3,
            persistence_workers: 5,
            enqueue_timeout: None,
        };
        assert_eq!(config.inspection_capacity(), 6);
        assert_eq!(config.result_capacity(), 10);
    }

    #[tokio::test]
    async fn test_results_reach_the_sink() {
        let mut registry = LinterRegistry::new();
        registry.register("text", Arc::new(StubLinter::default()));
        let (sink, written) = recording_sink();
        let (queue, intake) = inspection_queue(&config(2, None));
        let pipeline = InspectionPipeline::start(intake, Arc::new(registry), sink);

        queue.enqueue(doc(1, "text")).await.unwrap();
        queue.enqueue(doc(2, "rust")).await.unwrap();

        let mut results = Vec::new();
        for _ in 0..2 {
            let doc = tokio::time::timeout(Duration::from_secs(5), written.recv_async())
                .await
                .unwrap()
                .unwrap();
            results.push(doc);
        }
        results.sort_by_key(|d| d.id);

        assert_eq!(results[0].lint_status, "Text inspected");
        assert_eq!(results[0].version, 1);
        assert_eq!(results[1].lint_status, "No inspection for rust");

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer() {
        let gated = gated_pipeline(None);

        // The single worker takes the first document and waits on the gate.
        gated.queue.enqueue(doc(1, "go")).await.unwrap();
        gated.started.recv_async().await.unwrap();

        // Capacity is two.
        gated.queue.enqueue(doc(2, "go")).await.unwrap();
        gated.queue.enqueue(doc(3, "go")).await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(100), gated.queue.enqueue(doc(4, "go")))
                .await;
        assert!(blocked.is_err(), "enqueue should wait for room");

        gated.gate.add_permits(10);
        tokio::time::timeout(Duration::from_secs(5), gated.queue.enqueue(doc(4, "go")))
            .await
            .unwrap()
            .unwrap();

        for _ in 0..4 {
            tokio::time::timeout(Duration::from_secs(5), gated.written.recv_async())
                .await
                .unwrap()
                .unwrap();
        }
        gated.pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_timeout_is_unavailable() {
        let gated = gated_pipeline(Some(Duration::from_millis(50)));

        gated.queue.enqueue(doc(1, "go")).await.unwrap();
        gated.started.recv_async().await.unwrap();
        gated.queue.enqueue(doc(2, "go")).await.unwrap();
        gated.queue.enqueue(doc(3, "go")).await.unwrap();

        let result = gated.queue.enqueue(doc(4, "go")).await;
        assert!(matches!(result, Err(Error::Unavailable(_))));

        gated.gate.add_permits(10);
        gated.pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_work() {
        let mut registry = LinterRegistry::new();
        registry.register("text", Arc::new(StubLinter::default()));
        let (sink, written) = recording_sink();
        let (queue, intake) = inspection_queue(&config(1, None));
        let pipeline = InspectionPipeline::start(intake, Arc::new(registry), sink);

        for id in 1..=3 {
            queue.enqueue(doc(id, "text")).await.unwrap();
        }
        pipeline.shutdown().await;

        let ids: Vec<DocId> = written.drain().map(|d| d.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_unavailable() {
        let (sink, _written) = recording_sink();
        let (queue, intake) = inspection_queue(&config(1, None));
        let pipeline = InspectionPipeline::start(intake, Arc::new(LinterRegistry::new()), sink);

        pipeline.shutdown().await;

        assert!(queue.is_closed());
        let result = queue.enqueue(doc(1, "text")).await;
        assert!(matches!(result, Err(Error::Unavailable(_))));
    }
}
