use crate::error::AppError;
use crate::models::workflow_types::WorkflowView;
use crate::services::photo_service;
use crate::workflow::{Triggered, WorkflowHandle, WorkflowState};
use tauri::{AppHandle, Emitter, State};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::watch;

#[tauri::command]
pub fn get_workflow_view(workflow: State<'_, WorkflowHandle>) -> WorkflowView {
    workflow.view()
}

/// Runs the action of the button the webview rendered for `state`.
#[tauri::command]
pub async fn trigger_action(
    app: AppHandle,
    workflow: State<'_, WorkflowHandle>,
    state: WorkflowState,
) -> Result<WorkflowView, AppError> {
    match workflow.trigger(state).await? {
        Triggered::OpenFilePicker => open_photo_picker(&app, workflow.inner().clone()),
        triggered => tracing::debug!(?triggered, bound_to = %state, "action dispatched"),
    }
    Ok(workflow.view())
}

/// Completion path for files dropped onto the window. Non-image files are
/// skipped; a drop without photos is a no-op.
#[tauri::command]
pub async fn upload_photo(
    workflow: State<'_, WorkflowHandle>,
    paths: Vec<String>,
) -> Result<WorkflowView, AppError> {
    workflow.upload(photo_service::image_handles(&paths)).await?;
    Ok(workflow.view())
}

#[tauri::command]
pub async fn get_photo_preview(workflow: State<'_, WorkflowHandle>) -> Result<Option<String>, AppError> {
    let Some(image) = workflow.view().image else {
        return Ok(None);
    };

    let url = tokio::task::spawn_blocking(move || photo_service::preview_data_url(&image.path))
        .await
        .map_err(|e| AppError {
            message: format!("Task join failed: {}", e),
        })??;
    Ok(Some(url))
}

fn open_photo_picker(app: &AppHandle, workflow: WorkflowHandle) {
    app.dialog()
        .file()
        .set_title("Upload photo")
        .add_filter("Images", photo_service::IMAGE_EXTENSIONS)
        .pick_file(move |picked| {
            let files = photo_service::image_handles(picked.and_then(|path| path.into_path().ok()));

            tauri::async_runtime::spawn(async move {
                if let Err(e) = workflow.upload(files).await {
                    tracing::error!(error = %e, "failed to deliver photo selection");
                }
            });
        });
}

/// Pushes every published view to the webview as `workflow-changed`.
pub async fn forward_view_changes(app: AppHandle, mut views: watch::Receiver<WorkflowView>) {
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        if let Err(e) = app.emit("workflow-changed", &view) {
            tracing::warn!(error = %e, "failed to emit workflow view");
        }
    }
}
