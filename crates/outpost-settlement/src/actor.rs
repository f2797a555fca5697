//! Reconciler actor: one task that owns a [`SettlementReconciler`].
//!
//! Network code and game code never touch the index or the world
//! directly. They send commands through a [`ReconcilerHandle`] and the
//! actor applies them one at a time, so the buckets, the aggregate index
//! and the world are only ever mutated from this task.

use outpost_protocol::ServerRecord;
use tokio::sync::{mpsc, oneshot};

use crate::{ReconcileReport, SettlementError, SettlementIndex, SettlementReconciler, World, WorldSettlement};

/// Commands sent to the reconciler actor.
enum ReconcilerCommand {
    /// Apply a settlement record, then run a reconciliation pass.
    Apply {
        record: ServerRecord,
        reply: oneshot::Sender<Option<ReconcileReport>>,
    },

    /// Run a reconciliation pass on its own.
    Reconcile {
        reply: oneshot::Sender<ReconcileReport>,
    },

    /// Copy of the current index.
    Index {
        reply: oneshot::Sender<SettlementIndex>,
    },

    /// Copy of the current world objects.
    World {
        reply: oneshot::Sender<Vec<WorldSettlement>>,
    },

    Shutdown,
}

/// Handle to a running reconciler actor.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ReconcilerHandle {
    sender: mpsc::Sender<ReconcilerCommand>,
}

impl ReconcilerHandle {
    /// Applies a settlement record and reconciles.
    ///
    /// Returns `None` if the record was not a settlement record.
    pub async fn apply(&self, record: ServerRecord) -> Result<Option<ReconcileReport>, SettlementError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::Apply { record, reply })
            .await
            .map_err(|_| SettlementError::Unavailable)?;
        rx.await.map_err(|_| SettlementError::Unavailable)
    }

    /// Runs a reconciliation pass.
    pub async fn reconcile(&self) -> Result<ReconcileReport, SettlementError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::Reconcile { reply })
            .await
            .map_err(|_| SettlementError::Unavailable)?;
        rx.await.map_err(|_| SettlementError::Unavailable)
    }

    /// Returns a snapshot of the index.
    pub async fn index(&self) -> Result<SettlementIndex, SettlementError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::Index { reply })
            .await
            .map_err(|_| SettlementError::Unavailable)?;
        rx.await.map_err(|_| SettlementError::Unavailable)
    }

    /// Returns a snapshot of the world's settlement objects.
    pub async fn world(&self) -> Result<Vec<WorldSettlement>, SettlementError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::World { reply })
            .await
            .map_err(|_| SettlementError::Unavailable)?;
        rx.await.map_err(|_| SettlementError::Unavailable)
    }

    /// Stops the actor. Commands already queued are still processed.
    pub async fn shutdown(&self) -> Result<(), SettlementError> {
        self.sender
            .send(ReconcilerCommand::Shutdown)
            .await
            .map_err(|_| SettlementError::Unavailable)
    }
}

struct ReconcilerActor<W: World> {
    reconciler: SettlementReconciler<W>,
    receiver: mpsc::Receiver<ReconcilerCommand>,
}

impl<W: World> ReconcilerActor<W> {
    async fn run(mut self) {
        tracing::debug!("settlement reconciler started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                ReconcilerCommand::Apply { record, reply } => {
                    let report = self
                        .reconciler
                        .apply(record)
                        .then(|| self.reconciler.reconcile());
                    let _ = reply.send(report);
                }
                ReconcilerCommand::Reconcile { reply } => {
                    let _ = reply.send(self.reconciler.reconcile());
                }
                ReconcilerCommand::Index { reply } => {
                    let _ = reply.send(self.reconciler.index().clone());
                }
                ReconcilerCommand::World { reply } => {
                    let _ = reply.send(self.reconciler.world().settlements());
                }
                ReconcilerCommand::Shutdown => break,
            }
        }

        tracing::debug!("settlement reconciler stopped");
    }
}

/// Moves `world` into a new reconciler task and returns its handle.
///
/// The task ends on [`ReconcilerHandle::shutdown`] or once every handle
/// is dropped.
pub fn spawn_reconciler<W: World>(world: W, channel_size: usize) -> ReconcilerHandle {
    let (sender, receiver) = mpsc::channel(channel_size);
    let actor = ReconcilerActor {
        reconciler: SettlementReconciler::new(world),
        receiver,
    };
    tokio::spawn(actor.run());
    ReconcilerHandle { sender }
}
