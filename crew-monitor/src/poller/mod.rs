//! Dashboard task.
//!
//! [`Poller`] runs the [`Dashboard`] state machine on a tokio task. It
//! owns the only timer, executes each [`Effect`] by spawning a backend
//! request, and feeds results back as they complete. Operator input
//! arrives through a [`DashboardHandle`].

mod dashboard;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Sleep};
use tokio_util::sync::CancellationToken;

pub use dashboard::{CycleId, Dashboard, DetailTicket, Effect, Phase};

use crate::api_client::Backend;
use crate::api_client::types::{MinerDetail, MinerId, MinerRecord, PathKind, RunResult};
use crate::commands::{DashboardCommand, DashboardHandle};
use crate::config::DashboardConfig;
use crate::dispatch::UpdateRequest;
use crate::error::Result;
use crate::render::Renderer;
use crate::tracing::prelude::*;

const COMMAND_CHANNEL_CAPACITY: usize = 16;
const COMPLETION_CHANNEL_CAPACITY: usize = 32;

/// A backend request that finished, tagged with what issued it.
enum Completion {
    List(CycleId, Result<Vec<MinerRecord>>),
    Detail(DetailTicket, Result<MinerDetail>),
    Path(PathKind, Result<String>),
    Update(UpdateRequest, Result<()>),
    Test(MinerId, Result<RunResult>),
    Reload(Result<String>),
}

pub struct Poller<B, R> {
    dashboard: Dashboard<R>,
    backend: Arc<B>,
    commands: mpsc::Receiver<DashboardCommand>,
    completion_tx: mpsc::Sender<Completion>,
    completions: mpsc::Receiver<Completion>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl<B: Backend, R: Renderer> Poller<B, R> {
    pub fn new(config: &DashboardConfig, backend: Arc<B>, renderer: R) -> (Self, DashboardHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (completion_tx, completions) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);

        let poller = Self {
            dashboard: Dashboard::new(config, renderer),
            backend,
            commands,
            completion_tx,
            completions,
            timer: None,
        };
        (poller, DashboardHandle::new(command_tx))
    }

    /// Poll until `shutdown` is cancelled. Keeps polling after every
    /// handle is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(backend = "crew", "Dashboard started");
        let effects = self.dashboard.start();
        self.apply(effects);

        let mut commands_open = true;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                command = self.commands.recv(), if commands_open => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("All dashboard handles dropped");
                            commands_open = false;
                        }
                    }
                }
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion);
                }
                () = expired(&mut self.timer) => {
                    self.timer = None;
                    let effects = self.dashboard.timer_fired();
                    self.apply(effects);
                }
            }
        }

        info!("Dashboard stopped");
    }

    fn handle_command(&mut self, command: DashboardCommand) {
        let effects = match command {
            DashboardCommand::Select(id) => self.dashboard.select(id),
            DashboardCommand::Deselect => {
                self.dashboard.deselect();
                Vec::new()
            }
            DashboardCommand::SetAutoRefresh(on) => self.dashboard.set_auto_refresh(on),
            DashboardCommand::Refresh => self.dashboard.refresh(),
            DashboardCommand::Update { command, reply } => {
                answer(reply, self.dashboard.update(command))
            }
            DashboardCommand::RunTest { reply } => answer(reply, self.dashboard.run_test()),
            DashboardCommand::Reload => self.dashboard.reload(),
        };
        self.apply(effects);
    }

    fn handle_completion(&mut self, completion: Completion) {
        let effects = match completion {
            Completion::List(cycle, result) => self.dashboard.list_completed(cycle, result),
            Completion::Detail(ticket, result) => self.dashboard.detail_completed(ticket, result),
            Completion::Path(kind, result) => {
                self.dashboard.path_completed(kind, result);
                Vec::new()
            }
            Completion::Update(request, result) => {
                self.dashboard.update_submitted(request, result);
                Vec::new()
            }
            Completion::Test(id, result) => {
                self.dashboard.test_completed(id, result);
                Vec::new()
            }
            Completion::Reload(result) => {
                self.dashboard.reload_completed(result);
                Vec::new()
            }
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            trace!(effect = ?effect, "Applying effect");
            match effect {
                Effect::FetchList(cycle) => self.spawn(move |backend| async move {
                    Completion::List(cycle, backend.miners().await)
                }),
                Effect::FetchDetail(ticket) => self.spawn(move |backend| async move {
                    Completion::Detail(ticket, backend.miner(ticket.miner).await)
                }),
                Effect::FetchPath(kind) => self.spawn(move |backend| async move {
                    Completion::Path(kind, backend.path(kind).await)
                }),
                Effect::SubmitUpdate(request) => self.spawn(move |backend| async move {
                    let result = backend.update(&request).await;
                    Completion::Update(request, result)
                }),
                Effect::RunTest(id) => self.spawn(move |backend| async move {
                    Completion::Test(id, backend.run(id).await)
                }),
                Effect::Reload => self.spawn(|backend| async move {
                    Completion::Reload(backend.reload().await)
                }),
                Effect::ArmTimer(after) => self.timer = Some(Box::pin(time::sleep(after))),
                Effect::CancelTimer => self.timer = None,
            }
        }
    }

    fn spawn<F, Fut>(&self, request: F)
    where
        F: FnOnce(Arc<B>) -> Fut,
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let request = request(Arc::clone(&self.backend));
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            if completion_tx.send(request.await).await.is_err() {
                trace!("Dashboard stopped before request completed");
            }
        });
    }
}

/// Resolves when the timer fires; never resolves when none is armed.
async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn answer(reply: oneshot::Sender<Result<()>>, result: Result<Vec<Effect>>) -> Vec<Effect> {
    match result {
        Ok(effects) => {
            let _ = reply.send(Ok(()));
            effects
        }
        Err(e) => {
            debug!("Command rejected: {e}");
            let _ = reply.send(Err(e));
            Vec::new()
        }
    }
}
