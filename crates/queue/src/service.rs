//! Queue service: a single tokio task that owns the [`QueueState`].
//!
//! Public handles only enqueue commands, so passes never interleave and
//! observers always run on the service task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use uplift_protocol::{FileId, FileSnapshot, QueueOptions};
use uplift_transfer::{EngineEvent, TransferEngine, Transport};

use crate::handle::FileHandle;
use crate::observer::QueueObserver;
use crate::state::{PendingFile, QueueState};

pub(crate) enum Command {
    Admit(Vec<PendingFile>),
    Remove(FileId),
    Cancel(FileId),
    Start(FileId),
    Clear,
    SetOptions(QueueOptions),
    Subscribe(Arc<dyn QueueObserver>),
    Snapshot(oneshot::Sender<Vec<FileSnapshot>>),
}

/// Cloneable handle to a running queue service.
///
/// The service stops once every handle (including [`FileHandle`]s) has been
/// dropped; in-flight transfers are aborted at that point.
#[derive(Debug, Clone)]
pub struct UploadQueue {
    commands: mpsc::UnboundedSender<Command>,
}

impl UploadQueue {
    /// Spawns a queue whose transfers go through `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(options: QueueOptions, transport: Arc<dyn Transport>) -> Self {
        let (engine, events) = TransferEngine::new(transport);
        Self::spawn_with(QueueState::new(options, Box::new(engine)), events)
    }

    /// Spawns a service around an existing state and its engine event stream.
    pub fn spawn_with(state: QueueState, events: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(state, commands_rx, events));
        Self { commands }
    }

    /// Admits a batch and returns one handle per file, in order.
    pub fn admit(&self, files: Vec<PendingFile>) -> Vec<FileHandle> {
        let handles = files
            .iter()
            .map(|f| FileHandle::new(f.id, self.commands.clone()))
            .collect();
        self.send(Command::Admit(files));
        handles
    }

    pub fn remove(&self, id: FileId) {
        self.send(Command::Remove(id));
    }

    pub fn cancel(&self, id: FileId) {
        self.send(Command::Cancel(id));
    }

    pub fn start(&self, id: FileId) {
        self.send(Command::Start(id));
    }

    /// Cancels in-flight transfers and empties the queue.
    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    pub fn set_options(&self, options: QueueOptions) {
        self.send(Command::SetOptions(options));
    }

    /// Adds an observer; it sees every event raised after this command runs.
    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) {
        self.send(Command::Subscribe(observer));
    }

    /// Current collection in admission order. Empty if the service is gone.
    pub async fn snapshot(&self) -> Vec<FileSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx));
        rx.await.unwrap_or_default()
    }

    /// Handle for a file admitted earlier.
    pub fn handle(&self, id: FileId) -> FileHandle {
        FileHandle::new(id, self.commands.clone())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("queue service gone, command dropped");
        }
    }
}

async fn run(
    mut state: QueueState,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
) {
    debug!("queue service started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut state, command),
                None => break,
            },
            Some(event) = events.recv() => state.apply(event.id, event.event),
        }
    }

    state.abort_all();
    info!(remaining = state.len(), "queue service stopped");
}

fn handle_command(state: &mut QueueState, command: Command) {
    match command {
        Command::Admit(files) => state.admit(files),
        Command::Remove(id) => state.remove(id),
        Command::Cancel(id) => state.cancel(id),
        Command::Start(id) => state.start(id),
        Command::Clear => state.clear(),
        Command::SetOptions(options) => state.set_options(options),
        Command::Subscribe(observer) => state.subscribe(observer),
        Command::Snapshot(reply) => {
            let _ = reply.send(state.snapshot());
        }
    }
}
