use crate::models::classify_types::ResultItem;
use crate::workflow::state::WorkflowState;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Reference to the photo the user picked.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageHandle {
    pub path: PathBuf,
    pub file_name: String,
}

impl ImageHandle {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Self { path, file_name }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ActionView {
    pub label: &'static str,
    pub enabled: bool,
}

/// Everything the rendering layer needs to draw the page.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    pub state: WorkflowState,
    pub action: ActionView,
    pub show_image: bool,
    pub show_results: bool,
    pub image: Option<ImageHandle>,
    pub results: Vec<ResultItem>,
    pub error: Option<String>,
}
