use tokio::sync::mpsc;

use uplift_protocol::FileId;

use crate::service::Command;

/// Start/cancel/remove capability for one admitted file.
///
/// Commands are queued to the service; once the file has been removed they
/// are ignored there.
#[derive(Debug, Clone)]
pub struct FileHandle {
    id: FileId,
    commands: mpsc::UnboundedSender<Command>,
}

impl FileHandle {
    pub(crate) fn new(id: FileId, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    /// Starts the file if it is queued and a slot is free.
    pub fn start(&self) {
        self.send(Command::Start(self.id));
    }

    /// Cancels the file if it is uploading.
    pub fn cancel(&self) {
        self.send(Command::Cancel(self.id));
    }

    pub fn remove(&self) {
        self.send(Command::Remove(self.id));
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!(file = %self.id, "queue service gone, command dropped");
        }
    }
}
