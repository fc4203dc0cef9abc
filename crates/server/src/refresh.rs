//! Background App Home re-publishing after user mutations.
//!
//! Requests go through a bounded queue to a single worker. Enqueueing never
//! waits: when the queue is full the request is dropped and logged. Each
//! request is attempted at most once and failures are handed to a
//! [`FailureSink`].

use std::sync::Arc;

use async_trait::async_trait;
use tally_slack::{HomeTab, InteractionContext};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::interactions::InteractionError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Which user's App Home to re-publish and on which tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
    pub context: InteractionContext,
    pub tab: HomeTab,
}

impl RefreshRequest {
    pub fn new(context: InteractionContext, tab: HomeTab) -> Self {
        Self { context, tab }
    }
}

#[async_trait]
pub trait HomeRefresher: Send + Sync {
    async fn refresh(&self, request: &RefreshRequest) -> Result<(), InteractionError>;
}

pub trait FailureSink: Send + Sync {
    fn record(&self, request: &RefreshRequest, error: &InteractionError);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingFailureSink;

impl FailureSink for LoggingFailureSink {
    fn record(&self, request: &RefreshRequest, error: &InteractionError) {
        error!(
            event_name = "server.refresh.failed",
            workspace = %request.context.workspace,
            user_id = %request.context.user_id,
            tab = request.tab.action_id(),
            error = %error,
            "app home refresh failed"
        );
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub processed: usize,
    pub failed: usize,
}

/// Cheap handle used by request handlers to enqueue refreshes.
#[derive(Clone)]
pub struct RefreshHandle {
    sender: mpsc::Sender<RefreshRequest>,
}

impl RefreshHandle {
    /// Returns `false` when the request was dropped.
    pub fn enqueue(&self, request: RefreshRequest) -> bool {
        let (request, reason) = match self.sender.try_send(request) {
            Ok(()) => return true,
            Err(TrySendError::Full(request)) => (request, "queue_full"),
            Err(TrySendError::Closed(request)) => (request, "shutting_down"),
        };
        warn!(
            event_name = "server.refresh.dropped",
            workspace = %request.context.workspace,
            user_id = %request.context.user_id,
            reason,
            "app home refresh dropped"
        );
        false
    }
}

pub struct RefreshDispatcher {
    handle: RefreshHandle,
    stop: oneshot::Sender<()>,
    worker: JoinHandle<RefreshStats>,
}

impl RefreshDispatcher {
    pub fn spawn(
        refresher: Arc<dyn HomeRefresher>,
        sink: Arc<dyn FailureSink>,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (stop, stopped) = oneshot::channel();
        let worker = tokio::spawn(run_worker(receiver, stopped, refresher, sink));

        Self { handle: RefreshHandle { sender }, stop, worker }
    }

    pub fn handle(&self) -> RefreshHandle {
        self.handle.clone()
    }

    /// Stops accepting requests, finishes the queued ones, and joins the worker.
    pub async fn shutdown(self) -> RefreshStats {
        let _ = self.stop.send(());
        match self.worker.await {
            Ok(stats) => stats,
            Err(join_error) => {
                error!(
                    event_name = "server.refresh.worker_panicked",
                    error = %join_error,
                    "refresh worker did not finish cleanly"
                );
                RefreshStats::default()
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<RefreshRequest>,
    mut stopped: oneshot::Receiver<()>,
    refresher: Arc<dyn HomeRefresher>,
    sink: Arc<dyn FailureSink>,
) -> RefreshStats {
    let mut stats = RefreshStats::default();

    loop {
        tokio::select! {
            biased;
            _ = &mut stopped => break,
            next = receiver.recv() => match next {
                Some(request) => process(&request, refresher.as_ref(), sink.as_ref(), &mut stats).await,
                None => return stats,
            },
        }
    }

    receiver.close();
    while let Some(request) = receiver.recv().await {
        process(&request, refresher.as_ref(), sink.as_ref(), &mut stats).await;
    }
    debug!(
        event_name = "server.refresh.drained",
        processed = stats.processed,
        failed = stats.failed,
        "refresh queue drained"
    );
    stats
}

async fn process(
    request: &RefreshRequest,
    refresher: &dyn HomeRefresher,
    sink: &dyn FailureSink,
    stats: &mut RefreshStats,
) {
    stats.processed += 1;
    if let Err(error) = refresher.refresh(request).await {
        stats.failed += 1;
        sink.record(request, &error);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tally_slack::{HomeTab, InteractionContext};
    use tokio::sync::{Notify, Semaphore};

    use super::{FailureSink, HomeRefresher, RefreshDispatcher, RefreshRequest, RefreshStats};
    use crate::interactions::InteractionError;

    fn request(user: &str) -> RefreshRequest {
        RefreshRequest::new(
            InteractionContext { user_id: user.to_owned(), workspace: "T1".to_owned() },
            HomeTab::Explore,
        )
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl HomeRefresher for Recorder {
        async fn refresh(&self, request: &RefreshRequest) -> Result<(), InteractionError> {
            let context = &request.context;
            self.seen.lock().expect("lock").push(context.user_id.clone());
            if self.fail_for.as_deref() == Some(context.user_id.as_str()) {
                return Err(InteractionError::MissingInstallation(context.workspace.clone()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<String>>);

    impl FailureSink for CollectingSink {
        fn record(&self, request: &RefreshRequest, error: &InteractionError) {
            self.0.lock().expect("lock").push(format!("{}: {error}", request.context.user_id));
        }
    }

    /// Blocks every refresh until the test releases a permit.
    struct Gated {
        started: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl HomeRefresher for Gated {
        async fn refresh(&self, _request: &RefreshRequest) -> Result<(), InteractionError> {
            self.started.notify_one();
            let permit = self.gate.acquire().await.expect("gate open");
            permit.forget();
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_drains_queued_requests_in_order() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher =
            RefreshDispatcher::spawn(recorder.clone(), Arc::new(CollectingSink::default()), 8);
        let handle = dispatcher.handle();

        for user in ["U1", "U2", "U3"] {
            assert!(handle.enqueue(request(user)));
        }
        let stats = dispatcher.shutdown().await;

        assert_eq!(stats, RefreshStats { processed: 3, failed: 0 });
        assert_eq!(*recorder.seen.lock().expect("lock"), vec!["U1", "U2", "U3"]);
        assert!(!handle.enqueue(request("U4")), "closed queue must reject new requests");
    }

    #[tokio::test]
    async fn failures_go_to_the_sink_and_do_not_stop_the_worker() {
        let recorder =
            Arc::new(Recorder { fail_for: Some("U1".to_owned()), ..Recorder::default() });
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = RefreshDispatcher::spawn(recorder.clone(), sink.clone(), 8);
        let handle = dispatcher.handle();

        handle.enqueue(request("U1"));
        handle.enqueue(request("U2"));
        let stats = dispatcher.shutdown().await;

        assert_eq!(stats, RefreshStats { processed: 2, failed: 1 });
        let failures = sink.0.lock().expect("lock").clone();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("U1: "));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_waiting() {
        let gated = Arc::new(Gated { started: Notify::new(), gate: Semaphore::new(0) });
        let dispatcher =
            RefreshDispatcher::spawn(gated.clone(), Arc::new(CollectingSink::default()), 1);
        let handle = dispatcher.handle();

        assert!(handle.enqueue(request("U1")));
        gated.started.notified().await;
        assert!(handle.enqueue(request("U2")));
        assert!(!handle.enqueue(request("U3")));

        gated.gate.add_permits(2);
        let stats = dispatcher.shutdown().await;
        assert_eq!(stats.processed, 2);
    }
}
