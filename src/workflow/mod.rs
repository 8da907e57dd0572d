pub mod controller;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod state;

pub use controller::{Action, WorkflowController};
pub use runtime::{Triggered, WorkflowHandle};
pub use state::{transition, Event, WorkflowState};
