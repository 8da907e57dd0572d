//! Actor that drives a [`WorkflowController`] on a single task.
//!
//! Handles talk to the actor over an mpsc channel; spawned jobs report back on
//! a second one. The actor is the only consumer of both, so every state
//! change is applied in order on one task. After each change the fresh
//! [`WorkflowView`] is published on a watch channel.

use crate::error::WorkflowError;
use crate::models::workflow_types::{ImageHandle, WorkflowView};
use crate::workflow::controller::{Completion, Dispatch, WorkflowController};
use crate::workflow::state::WorkflowState;
use tokio::sync::{mpsc, oneshot, watch};

/// Outcome of a trigger, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triggered {
    Started,
    OpenFilePicker,
    Reset,
    Ignored,
}

enum Command {
    Trigger {
        bound_to: WorkflowState,
        reply: oneshot::Sender<Triggered>,
    },
    Upload {
        files: Vec<ImageHandle>,
        reply: oneshot::Sender<bool>,
    },
}

#[derive(Clone)]
pub struct WorkflowHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<WorkflowView>,
}

pub struct WorkflowActor {
    controller: WorkflowController,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    view: watch::Sender<WorkflowView>,
}

/// Creates a handle and the actor it talks to. The actor does nothing until
/// [`WorkflowActor::run`] is spawned on a Tokio runtime.
pub fn channel(controller: WorkflowController) -> (WorkflowHandle, WorkflowActor) {
    let (commands_tx, commands) = mpsc::unbounded_channel();
    let (completions_tx, completions) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(controller.view());

    let handle = WorkflowHandle {
        commands: commands_tx,
        view: view_rx,
    };
    let actor = WorkflowActor {
        controller,
        commands,
        completions_tx,
        completions,
        view: view_tx,
    };
    (handle, actor)
}

impl WorkflowHandle {
    /// Fires the action bound to `bound_to`.
    pub async fn trigger(&self, bound_to: WorkflowState) -> Result<Triggered, WorkflowError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Trigger { bound_to, reply })
            .map_err(|_| WorkflowError::RuntimeStopped)?;
        rx.await.map_err(|_| WorkflowError::RuntimeStopped)
    }

    /// Delivers a file selection. Returns whether the workflow advanced.
    pub async fn upload(&self, files: Vec<ImageHandle>) -> Result<bool, WorkflowError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Upload { files, reply })
            .map_err(|_| WorkflowError::RuntimeStopped)?;
        rx.await.map_err(|_| WorkflowError::RuntimeStopped)
    }

    pub fn view(&self) -> WorkflowView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowView> {
        self.view.clone()
    }
}

impl WorkflowActor {
    /// Runs until every [`WorkflowHandle`] has been dropped.
    pub async fn run(mut self) {
        tracing::debug!("workflow actor started");
        loop {
            tokio::select! {
                biased;

                Some(completion) = self.completions.recv() => {
                    self.controller.apply(completion);
                    self.publish();
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        tracing::debug!("workflow actor stopped");
    }

    /// Applies one command. The new view is published before the caller is
    /// answered.
    fn handle(&mut self, command: Command) {
        match command {
            Command::Trigger { bound_to, reply } => {
                let triggered = match self.controller.dispatch(bound_to) {
                    Dispatch::Spawned(job) => {
                        let completions = self.completions_tx.clone();
                        tokio::spawn(async move {
                            let completion = job.await;
                            if completions.send(completion).is_err() {
                                tracing::warn!("workflow actor gone before job completed");
                            }
                        });
                        Triggered::Started
                    }
                    Dispatch::OpenFilePicker => Triggered::OpenFilePicker,
                    Dispatch::Reset => Triggered::Reset,
                    Dispatch::Ignored => Triggered::Ignored,
                };
                self.publish();
                let _ = reply.send(triggered);
            }
            Command::Upload { files, reply } => {
                let advanced = self.controller.upload(files);
                self.publish();
                let _ = reply.send(advanced);
            }
        }
    }

    fn publish(&self) {
        self.view.send_if_modified(|current| {
            let next = self.controller.view();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
