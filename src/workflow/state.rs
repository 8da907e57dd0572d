//! States of the identification workflow and the single rule that moves
//! between them.
//!
//! The table is static: each [`WorkflowState`] has a [`StateDescriptor`]
//! naming the state reached on [`Event::Next`] and whether the photo and the
//! results are visible. [`transition`] and the view flags both read from it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowState {
    Initial,
    LoadingModel,
    AwaitingUpload,
    Ready,
    Classifying,
    Complete,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 6] = [
        WorkflowState::Initial,
        WorkflowState::LoadingModel,
        WorkflowState::AwaitingUpload,
        WorkflowState::Ready,
        WorkflowState::Classifying,
        WorkflowState::Complete,
    ];

    pub const fn descriptor(self) -> StateDescriptor {
        match self {
            WorkflowState::Initial => StateDescriptor::new(WorkflowState::LoadingModel, false, false),
            WorkflowState::LoadingModel => {
                StateDescriptor::new(WorkflowState::AwaitingUpload, false, false)
            }
            WorkflowState::AwaitingUpload => StateDescriptor::new(WorkflowState::Ready, false, false),
            WorkflowState::Ready => StateDescriptor::new(WorkflowState::Classifying, true, false),
            WorkflowState::Classifying => StateDescriptor::new(WorkflowState::Complete, true, false),
            WorkflowState::Complete => StateDescriptor::new(WorkflowState::AwaitingUpload, true, true),
        }
    }

    pub const fn show_image(self) -> bool {
        self.descriptor().show_image
    }

    pub const fn show_results(self) -> bool {
        self.descriptor().show_results
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Initial => "initial",
            WorkflowState::LoadingModel => "loadingModel",
            WorkflowState::AwaitingUpload => "awaitingUpload",
            WorkflowState::Ready => "ready",
            WorkflowState::Classifying => "classifying",
            WorkflowState::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// The only way to move the workflow forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Event {
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDescriptor {
    on_next: WorkflowState,
    pub show_image: bool,
    pub show_results: bool,
}

impl StateDescriptor {
    const fn new(on_next: WorkflowState, show_image: bool, show_results: bool) -> Self {
        Self {
            on_next,
            show_image,
            show_results,
        }
    }

    /// State reached when `event` is accepted, `None` if the state ignores it.
    pub const fn on(&self, event: Event) -> Option<WorkflowState> {
        match event {
            Event::Next => Some(self.on_next),
        }
    }
}

pub const INITIAL_STATE: WorkflowState = WorkflowState::Initial;

/// Next state for `(state, event)`.
///
/// Pairs missing from the table fall back to [`INITIAL_STATE`]. That silent
/// restart is kept for compatibility; with a single event every pair is
/// currently defined, so the fallback is unreachable.
pub fn transition(state: WorkflowState, event: Event) -> WorkflowState {
    state.descriptor().on(event).unwrap_or(INITIAL_STATE)
}
