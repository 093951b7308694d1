use crate::attr::Attr;
use crate::context::LogContext;
use crate::handler::{HandleError, Handler, Scoped};
use crate::init::LayerConfig;
use crate::record::LogRecord;
use crate::sink::LogSink;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::level_filters::LevelFilter;
use tracing::Level;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Errors reported by [`SinkHandler`].
#[derive(thiserror::Error, Debug)]
pub enum SinkHandlerError {
    #[error("log channel full, record dropped")]
    ChannelFull,

    #[error("log sink task has stopped")]
    Closed,

    #[error("gave up on batch after {attempts} attempts, {dropped} records dropped")]
    BatchDropped {
        attempts: u32,
        dropped: usize,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Counters shared by a [`SinkHandler`] and all handlers derived from it.
#[derive(Debug, Default)]
pub struct SinkStats {
    /// Records passed to `handle`, before level filtering.
    pub seen: AtomicU64,
    /// Records accepted into the channel.
    pub enqueued: AtomicU64,
    /// Records rejected because the channel was full.
    pub dropped: AtomicU64,
}

/// Handle on the background task of a [`SinkHandler`].
///
/// The task ends on its own once every handler sharing its channel is
/// dropped. When a handler is owned by something that lives until process
/// exit, such as the global subscriber, call [`shutdown`](Self::shutdown)
/// to send pending records and flush the sink. Dropping the `SinkTask`
/// leaves the task running.
pub struct SinkTask {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl SinkTask {
    /// Stop accepting records, send what is queued, flush the sink and wait
    /// for the task to finish. Handlers report
    /// [`SinkHandlerError::Closed`] afterwards.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(());
        self.handle.await
    }

    /// Wait for the task to finish after all handlers are dropped.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }

    /// Cancel the task without sending queued records.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Terminal [`Handler`] that hands records to an asynchronous [`LogSink`].
///
/// `handle` never blocks: records go through a bounded channel to a
/// background task which batches them and drives the sink. The task stops
/// once every handler sharing the channel has been dropped, or on
/// [`SinkTask::shutdown`], after sending what is left and flushing the sink.
#[derive(Clone)]
pub struct SinkHandler {
    sender: mpsc::Sender<LogRecord>,
    max_level: LevelFilter,
    scoped: Scoped,
    stats: Arc<SinkStats>,
}

impl SinkHandler {
    /// Create the handler and spawn its background task on the current
    /// Tokio runtime.
    ///
    /// Minimal thresholds are enforced for the channel size, batch size and
    /// flush interval to avoid degenerate configurations.
    pub fn new(sink: Arc<dyn LogSink>, config: &LayerConfig) -> (Self, SinkTask) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let max_retries = config.max_retries;

        let (tx, rx) = mpsc::channel::<LogRecord>(buffer);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(
            sink,
            rx,
            shutdown_rx,
            batch_size,
            flush_interval,
            max_retries,
        ));

        let handler = SinkHandler {
            sender: tx,
            max_level: config.max_level,
            scoped: Scoped::default(),
            stats: Arc::new(SinkStats::default()),
        };
        let task = SinkTask {
            handle,
            shutdown: shutdown_tx,
        };
        (handler, task)
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    fn derive(&self, scoped: Scoped) -> Arc<dyn Handler> {
        Arc::new(SinkHandler {
            sender: self.sender.clone(),
            max_level: self.max_level,
            scoped,
            stats: Arc::clone(&self.stats),
        })
    }
}

impl Handler for SinkHandler {
    fn enabled(&self, _ctx: &LogContext, level: Level) -> bool {
        level <= self.max_level
    }

    fn handle(&self, ctx: &LogContext, record: LogRecord) -> Result<(), HandleError> {
        self.stats.seen.fetch_add(1, Ordering::Relaxed);
        if !self.enabled(ctx, record.level) {
            return Ok(());
        }

        match self.sender.try_send(self.scoped.apply(record)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(Box::new(SinkHandlerError::ChannelFull))
            }
            Err(TrySendError::Closed(_)) => Err(Box::new(SinkHandlerError::Closed)),
        }
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        self.derive(self.scoped.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        self.derive(self.scoped.with_group(name))
    }
}

async fn run(
    sink: Arc<dyn LogSink>,
    mut rx: mpsc::Receiver<LogRecord>,
    mut shutdown: oneshot::Receiver<()>,
    batch_size: usize,
    flush_interval: Duration,
    max_retries: u32,
) {
    let mut batch = Vec::with_capacity(batch_size);
    let mut ticker = interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut listening = true;

    loop {
        tokio::select! {
            // A dropped SinkTask resolves with an error and is not a shutdown.
            signal = &mut shutdown, if listening => {
                listening = false;
                if signal.is_ok() {
                    // Queued records are still received until `None`.
                    rx.close();
                }
            }
            received = rx.recv() => match received {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        if let Err(e) = send_batch(&*sink, &mut batch, max_retries).await {
                            eprintln!("error sending log batch: {}", e);
                        }
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    if let Err(e) = send_batch(&*sink, &mut batch, max_retries).await {
                        eprintln!("error flushing log batch: {}", e);
                    }
                }
            }
        }
    }

    if !batch.is_empty() {
        if let Err(e) = send_batch(&*sink, &mut batch, max_retries).await {
            eprintln!("error sending final log batch: {}", e);
        }
    }
    if let Err(e) = sink.flush().await {
        eprintln!("error flushing log sink: {}", e);
    }
}

/// Send `batch` in order, resuming from the failed record after each
/// backoff. The batch is always empty on return.
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<LogRecord>,
    max_retries: u32,
) -> Result<(), SinkHandlerError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut failures = 0u32;
    let mut sent = 0;

    while sent < batch.len() {
        match sink.send(&batch[sent]).await {
            Ok(()) => sent += 1,
            Err(e) => {
                failures += 1;
                if failures > max_retries {
                    let dropped = batch.len() - sent;
                    batch.clear();
                    return Err(SinkHandlerError::BatchDropped {
                        attempts: failures,
                        dropped,
                        source: e,
                    });
                }
                eprintln!("log sink send failed, retrying in {:?}", backoff);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
            }
        }
    }

    batch.clear();
    Ok(())
}
