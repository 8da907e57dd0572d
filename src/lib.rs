mod commands;
pub mod config;
pub mod error;
mod logging;
pub mod models;
pub mod services;
pub mod workflow;

use config::AppConfig;
use services::classifier::model_manager::ModelManager;
use std::sync::Arc;
use tauri::{Emitter, Manager};
use workflow::WorkflowController;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(|app| {
            let config_path = AppConfig::path_in(&app.path().app_config_dir()?);
            let (config, config_warning) = AppConfig::load_or_default(&config_path);
            logging::init_tracing(&config.log_filter);
            if let Some(warning) = config_warning {
                tracing::warn!(path = %config_path.display(), "{}", warning);
            }
            tracing::info!(model = ?config.model, use_gpu = config.use_gpu, top_k = config.top_k, "starting");

            let app_handle = app.handle().clone();
            let model_manager = ModelManager::new(app.path().app_data_dir()?, &config).with_progress(
                Arc::new(move |progress: u64| {
                    let _ = app_handle.emit("download-progress", progress);
                }),
            );

            let controller = WorkflowController::new(Arc::new(model_manager));
            let (handle, actor) = workflow::runtime::channel(controller);
            tauri::async_runtime::spawn(actor.run());
            tauri::async_runtime::spawn(commands::workflow::forward_view_changes(
                app.handle().clone(),
                handle.subscribe(),
            ));
            app.manage(handle);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::workflow::get_workflow_view,
            commands::workflow::trigger_action,
            commands::workflow::upload_photo,
            commands::workflow::get_photo_preview,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
