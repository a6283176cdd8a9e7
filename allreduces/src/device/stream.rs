use crate::error::{AlError, Result};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

enum Command {
    Run(BoxFuture<'static, Result<()>>),
    Sync(oneshot::Sender<Result<()>>),
}

/// An in-order queue of device work.
///
/// Operations run strictly one after another on a worker task. The first
/// failing operation poisons the stream: later operations are skipped and
/// the error is reported by the next `synchronize`, after which the stream
/// is usable again. Clones share the same queue.
#[derive(Clone)]
pub struct Stream {
    id: u64,
    tx: mpsc::UnboundedSender<Command>,
}

impl Stream {
    /// Create a stream whose worker runs on the current tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AlError::StreamFailed(format!("no runtime for stream worker: {e}")))?;
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(worker(id, rx));
        Ok(Self { id, tx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue `op` behind everything already enqueued.
    pub fn enqueue<F>(&self, op: F) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tx
            .send(Command::Run(Box::pin(op)))
            .map_err(|_| AlError::StreamFailed(format!("stream {} worker has stopped", self.id)))
    }

    /// Wait until every operation enqueued so far has finished, and report
    /// the first failure since the last synchronize.
    pub async fn synchronize(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Sync(done_tx))
            .map_err(|_| AlError::StreamFailed(format!("stream {} worker has stopped", self.id)))?;
        done_rx
            .await
            .map_err(|_| AlError::StreamFailed(format!("stream {} worker has stopped", self.id)))?
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("id", &self.id).finish()
    }
}

async fn worker(id: u64, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut failure: Option<AlError> = None;
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Run(op) => {
                if failure.is_some() {
                    continue;
                }
                if let Err(e) = op.await {
                    tracing::warn!(stream = id, "stream operation failed: {e}");
                    failure = Some(e);
                }
            }
            Command::Sync(done) => {
                let _ = done.send(failure.take().map_or(Ok(()), Err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_in_enqueue_order() {
        let stream = Stream::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5u32 {
            let log = Arc::clone(&log);
            stream
                .enqueue(async move {
                    // Later ops sleep less; order must still hold.
                    tokio::time::sleep(Duration::from_millis(u64::from(5 - i))).await;
                    log.lock().unwrap().push(i);
                    Ok(())
                })
                .unwrap();
        }
        stream.synchronize().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failure_is_sticky_until_synchronize() {
        let stream = Stream::new().unwrap();
        let ran = Arc::new(Mutex::new(false));
        stream
            .enqueue(async { Err(AlError::StreamFailed("boom".into())) })
            .unwrap();
        let flag = Arc::clone(&ran);
        stream
            .enqueue(async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            stream.synchronize().await,
            Err(AlError::StreamFailed(_))
        ));
        assert!(!*ran.lock().unwrap());
        stream.synchronize().await.unwrap();
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(Stream::new(), Err(AlError::StreamFailed(_))));
    }
}
