//! Per-invocation operation handles and their event streams
//!
//! Every call to [`crate::deploy`] or [`crate::mirror`] creates one operation.
//! The pipeline reports progress through its [`Reporter`]; the caller gets
//! the matching [`OperationHandle`] back immediately and subscribes to it.
//!
//! Each operation owns its own emitter, so a subscriber only ever sees the
//! events of the operation it subscribed to. Emitted events are kept in the
//! operation's history and replayed to late subscribers, which means a
//! caller that subscribes after the pipeline already made progress still
//! observes the full sequence.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Deploy,
    Mirror,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Deploy => write!(f, "deploy"),
            OperationKind::Mirror => write!(f, "mirror"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEvent {
    pub kind: EventKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Running)
    }
}

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

enum Sink {
    Callback {
        id: u64,
        kind: EventKind,
        listener: Listener,
    },
    Channel(flume::Sender<OperationEvent>),
}

#[derive(Default)]
struct Emitter {
    history: Vec<OperationEvent>,
    sinks: Vec<Sink>,
    next_listener_id: u64,
    closed: bool,
}

impl Emitter {
    fn deliver(sink: &Sink, event: &OperationEvent) {
        match sink {
            Sink::Callback { kind, listener, .. } if *kind == event.kind => {
                listener(&event.message)
            }
            Sink::Callback { .. } => {}
            Sink::Channel(tx) => {
                // the receiver may have been dropped, which is fine
                let _ = tx.send(event.clone());
            }
        }
    }
}

struct Shared {
    id: OperationId,
    kind: OperationKind,
    emitter: Mutex<Emitter>,
    status: watch::Sender<OperationStatus>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

/// Create a new operation, returning the pipeline side and the caller side.
pub fn start(kind: OperationKind) -> (Reporter, OperationHandle) {
    let (status, _) = watch::channel(OperationStatus::Running);
    let shared = Arc::new(Shared {
        id: OperationId::generate(),
        kind,
        emitter: Mutex::new(Emitter::default()),
        status,
    });

    (
        Reporter {
            shared: shared.clone(),
        },
        OperationHandle { shared },
    )
}

/// Pipeline-side emitter for one operation.
///
/// Dropping a reporter that never called [`Reporter::finish`] marks the
/// operation failed, so a panicking pipeline never leaves waiters hanging.
#[derive(Debug)]
pub struct Reporter {
    shared: Arc<Shared>,
}

impl Reporter {
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(operation_id = %self.shared.id, "{}", message);
        self.emit(EventKind::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(operation_id = %self.shared.id, "{}", message);
        self.emit(EventKind::Error, message);
    }

    fn emit(&self, kind: EventKind, message: String) {
        let event = OperationEvent { kind, message };
        let mut emitter = self.shared.emitter.lock();
        if emitter.closed {
            tracing::warn!(operation_id = %self.shared.id, "event after operation finished: {:?}", event);
            return;
        }
        for sink in &emitter.sinks {
            Emitter::deliver(sink, &event);
        }
        emitter.history.push(event);
    }

    /// Mark the operation finished and close its event channels.
    pub fn finish(self, status: OperationStatus) {
        self.close(status);
    }

    fn close(&self, status: OperationStatus) {
        {
            let mut emitter = self.shared.emitter.lock();
            if emitter.closed {
                return;
            }
            emitter.closed = true;
            // dropping the senders ends every channel subscription
            emitter.sinks.retain(|sink| matches!(sink, Sink::Callback { .. }));
        }
        self.shared.status.send_replace(status);
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.close(OperationStatus::Failed);
    }
}

/// Caller-side handle for one operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    shared: Arc<Shared>,
}

impl OperationHandle {
    pub fn id(&self) -> OperationId {
        self.shared.id
    }

    pub fn kind(&self) -> OperationKind {
        self.shared.kind
    }

    pub fn status(&self) -> OperationStatus {
        *self.shared.status.borrow()
    }

    /// Call `listener` with the message of every `kind` event of this operation,
    /// starting with the ones already emitted.
    ///
    /// Listeners run on the pipeline's task while the emitter is locked; they
    /// must not subscribe to or unsubscribe from the same operation.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let mut emitter = self.shared.emitter.lock();

        for event in emitter.history.iter().filter(|e| e.kind == kind) {
            listener(&event.message);
        }

        let id = emitter.next_listener_id;
        emitter.next_listener_id += 1;
        emitter.sinks.push(Sink::Callback { id, kind, listener });

        Subscription {
            shared: self.shared.clone(),
            id,
        }
    }

    /// Receive every event of this operation, starting with the ones already
    /// emitted. The channel disconnects once the operation finishes.
    pub fn subscribe(&self) -> flume::Receiver<OperationEvent> {
        let (tx, rx) = flume::unbounded();
        let mut emitter = self.shared.emitter.lock();

        for event in &emitter.history {
            let _ = tx.send(event.clone());
        }
        if !emitter.closed {
            emitter.sinks.push(Sink::Channel(tx));
        }

        rx
    }

    /// Events emitted so far.
    pub fn events(&self) -> Vec<OperationEvent> {
        self.shared.emitter.lock().history.clone()
    }

    /// Suspend until the operation succeeds or fails.
    pub async fn wait(&self) -> OperationStatus {
        let mut rx = self.shared.status.subscribe();
        let status = match rx.wait_for(OperationStatus::is_terminal).await {
            Ok(status) => *status,
            // the sender lives in `shared`, which we hold
            Err(_) => self.status(),
        };
        status
    }
}

/// A registered listener; see [`OperationHandle::on`].
#[derive(Debug)]
pub struct Subscription {
    shared: Arc<Shared>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let mut emitter = self.shared.emitter.lock();
        emitter.sinks.retain(|sink| match sink {
            Sink::Callback { id, .. } => *id != self.id,
            Sink::Channel(_) => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(handle: &OperationHandle, kind: EventKind) -> (Arc<Mutex<Vec<String>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = handle.on(kind, move |message| sink.lock().push(message.to_string()));
        (seen, subscription)
    }

    #[test]
    fn test_listener_filters_by_kind() {
        let (reporter, handle) = start(OperationKind::Deploy);
        let (infos, _sub) = collector(&handle, EventKind::Info);
        let (errors, _sub2) = collector(&handle, EventKind::Error);

        reporter.info("one");
        reporter.error("boom");
        reporter.info("two");

        assert_eq!(*infos.lock(), vec!["one", "two"]);
        assert_eq!(*errors.lock(), vec!["boom"]);
    }

    #[test]
    fn test_late_listener_gets_history() {
        let (reporter, handle) = start(OperationKind::Mirror);
        reporter.info("early");
        reporter.finish(OperationStatus::Succeeded);

        let (infos, _sub) = collector(&handle, EventKind::Info);
        assert_eq!(*infos.lock(), vec!["early"]);
        assert_eq!(handle.status(), OperationStatus::Succeeded);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (reporter, handle) = start(OperationKind::Deploy);
        let (infos, sub) = collector(&handle, EventKind::Info);

        reporter.info("before");
        sub.unsubscribe();
        reporter.info("after");

        assert_eq!(*infos.lock(), vec!["before"]);
    }

    #[test]
    fn test_operations_are_isolated() {
        let (first, first_handle) = start(OperationKind::Deploy);
        let (second, second_handle) = start(OperationKind::Deploy);
        assert_ne!(first_handle.id(), second_handle.id());

        let (infos, _sub) = collector(&first_handle, EventKind::Info);
        second.info("not mine");
        first.info("mine");

        assert_eq!(*infos.lock(), vec!["mine"]);
    }

    #[test]
    fn test_channel_closes_on_finish() {
        let (reporter, handle) = start(OperationKind::Deploy);
        let rx = handle.subscribe();

        reporter.info("a");
        reporter.error("b");
        reporter.finish(OperationStatus::Failed);

        let events: Vec<OperationEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Error);
    }

    #[test]
    fn test_dropped_reporter_fails_operation() {
        let (reporter, handle) = start(OperationKind::Deploy);
        drop(reporter);
        assert_eq!(handle.status(), OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_status() {
        let (reporter, handle) = start(OperationKind::Mirror);
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });

        reporter.finish(OperationStatus::Succeeded);
        assert_eq!(waiter.await.unwrap(), OperationStatus::Succeeded);
    }
}
