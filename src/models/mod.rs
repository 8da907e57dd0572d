pub mod classify_types;
pub mod workflow_types;
