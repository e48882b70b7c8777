//! Operator commands sent to the running dashboard.
//!
//! Commands that can be rejected carry a oneshot reply channel so the
//! caller learns why (for example, a scoped update with nothing
//! selected). The rest are fire-and-forget.

use tokio::sync::{mpsc, oneshot};

use crate::api_client::types::MinerId;
use crate::dispatch::UpdateCommand;
use crate::error::{Error, Result};

pub enum DashboardCommand {
    /// Inspect one miner; triggers an immediate poll.
    Select(MinerId),

    Deselect,

    /// Turn periodic polling on or off. Turning it on polls immediately.
    SetAutoRefresh(bool),

    /// Poll now.
    Refresh,

    Update {
        command: UpdateCommand,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Evaluate the rules under test against the selected miner.
    RunTest { reply: oneshot::Sender<Result<()>> },

    /// Reload the active rules.
    Reload,
}

/// Cloneable sender side of the dashboard's command channel.
#[derive(Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<DashboardCommand>,
}

impl DashboardHandle {
    pub(crate) fn new(tx: mpsc::Sender<DashboardCommand>) -> Self {
        Self { tx }
    }

    async fn send(&self, command: DashboardCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::Closed)
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> DashboardCommand,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    pub async fn select(&self, id: MinerId) -> Result<()> {
        self.send(DashboardCommand::Select(id)).await
    }

    pub async fn deselect(&self) -> Result<()> {
        self.send(DashboardCommand::Deselect).await
    }

    pub async fn set_auto_refresh(&self, on: bool) -> Result<()> {
        self.send(DashboardCommand::SetAutoRefresh(on)).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(DashboardCommand::Refresh).await
    }

    /// Dispatch an update. Returns once it has been resolved and handed to
    /// the backend task, not when the backend has applied it.
    pub async fn update(&self, command: UpdateCommand) -> Result<()> {
        self.request(|reply| DashboardCommand::Update { command, reply })
            .await
    }

    pub async fn run_test(&self) -> Result<()> {
        self.request(|reply| DashboardCommand::RunTest { reply }).await
    }

    pub async fn reload(&self) -> Result<()> {
        self.send(DashboardCommand::Reload).await
    }
}
