use crate::config::AppConfig;
use crate::error::{AppError, WorkflowError};
use crate::services::classifier::inference::OnnxClassifier;
use crate::workflow::provider::{Classifier, ModelProvider};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Receives download progress in percent.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelType {
    MobileNetV2,
    ConvNextV2Base,
}

struct ModelFiles {
    model_url: &'static str,
    config_url: &'static str,
    model_file: &'static str,
    config_file: &'static str,
}

impl ModelType {
    fn files(&self) -> ModelFiles {
        match self {
            ModelType::MobileNetV2 => ModelFiles {
                model_url: "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/onnx/model.onnx",
                config_url: "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/config.json",
                model_file: "mobilenet_v2_1.0_224.onnx",
                config_file: "mobilenet_v2_1.0_224-config.json",
            },
            ModelType::ConvNextV2Base => ModelFiles {
                model_url: "https://huggingface.co/Xenova/convnextv2-base-22k-384/resolve/main/onnx/model.onnx",
                config_url: "https://huggingface.co/Xenova/convnextv2-base-22k-384/resolve/main/config.json",
                model_file: "convnextv2-base-22k-384.onnx",
                config_file: "convnextv2-base-22k-384-config.json",
            },
        }
    }

    pub fn crop_size(&self) -> u32 {
        match self {
            ModelType::MobileNetV2 => 224,
            ModelType::ConvNextV2Base => 384,
        }
    }

    /// Per-channel `(mean, std)` the model was trained with.
    pub fn normalization(&self) -> ([f32; 3], [f32; 3]) {
        match self {
            ModelType::MobileNetV2 => ([0.5; 3], [0.5; 3]),
            ModelType::ConvNextV2Base => ([0.485, 0.456, 0.406], [0.229, 0.224, 0.225]),
        }
    }
}

/// Downloads and loads the ONNX classifier. Used by the workflow as its
/// [`ModelProvider`].
#[derive(Clone)]
pub struct ModelManager {
    model_dir: PathBuf,
    model_type: ModelType,
    use_gpu: bool,
    top_k: usize,
    on_progress: Option<ProgressFn>,
}

impl ModelManager {
    pub fn new(app_data_dir: PathBuf, config: &AppConfig) -> Self {
        Self {
            model_dir: app_data_dir.join("models"),
            model_type: config.model,
            use_gpu: config.use_gpu,
            top_k: config.top_k,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(self.model_type.files().model_file)
    }

    pub fn config_path(&self) -> PathBuf {
        self.model_dir.join(self.model_type.files().config_file)
    }

    pub fn is_downloaded(&self) -> bool {
        self.model_path().exists() && self.config_path().exists()
    }

    pub async fn download_model(&self) -> Result<(), AppError> {
        if self.is_downloaded() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.model_dir).await.map_err(|e| AppError {
            message: format!("Failed to create model directory: {}", e),
        })?;

        let files = self.model_type.files();
        tracing::info!(model = ?self.model_type, dir = %self.model_dir.display(), "downloading model");

        let config_path = self.config_path();
        if !config_path.exists() {
            download_file(files.config_url, &config_path, None).await?;
        }

        let model_path = self.model_path();
        if !model_path.exists() {
            download_file(files.model_url, &model_path, self.on_progress.as_ref()).await?;
        }

        Ok(())
    }

    pub async fn load_classifier(&self) -> Result<OnnxClassifier, AppError> {
        self.download_model().await?;

        let config_path = self.config_path();
        let config_content = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| AppError {
                message: format!("Failed to read config file {}: {}", config_path.display(), e),
            })?;
        let labels = parse_labels(&config_content)?;

        let model_path = self.model_path();
        let use_gpu = self.use_gpu;
        let session = tokio::task::spawn_blocking(move || build_session(&model_path, use_gpu))
            .await
            .map_err(|e| AppError {
                message: format!("Failed to spawn model loading task: {}", e),
            })??;

        tracing::info!(model = ?self.model_type, labels = labels.len(), use_gpu, "model ready");
        Ok(OnnxClassifier::new(session, labels, self.model_type, self.top_k))
    }
}

impl ModelProvider for ModelManager {
    fn load(&self) -> BoxFuture<'static, Result<Arc<dyn Classifier>, WorkflowError>> {
        let manager = self.clone();
        async move {
            manager
                .load_classifier()
                .await
                .map(|classifier| Arc::new(classifier) as Arc<dyn Classifier>)
                .map_err(|e| WorkflowError::ModelLoadFailure(e.message))
        }
        .boxed()
    }
}

/// Reads the `id2label` map of a Hugging Face `config.json` into a list
/// indexed by class id.
pub fn parse_labels(config_content: &str) -> Result<Vec<String>, AppError> {
    let config: serde_json::Value = serde_json::from_str(config_content).map_err(|e| AppError {
        message: format!("Failed to parse config JSON: {}", e),
    })?;

    let id2label = config["id2label"].as_object().ok_or_else(|| AppError {
        message: "Config missing id2label field".to_string(),
    })?;

    let mut labels = id2label
        .iter()
        .map(|(k, v)| {
            let idx = k.parse::<usize>().map_err(|_| AppError {
                message: format!("Invalid class id in id2label: {}", k),
            })?;
            let label = v.as_str().unwrap_or("unknown").to_string();
            Ok((idx, label))
        })
        .collect::<Result<Vec<(usize, String)>, AppError>>()?;
    labels.sort_by_key(|(idx, _)| *idx);

    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

fn build_session(model_path: &Path, use_gpu: bool) -> Result<Session, AppError> {
    let _ = ort::init().with_name("breed-lens").commit();

    let mut builder = Session::builder()
        .map_err(|e| AppError { message: format!("Failed to create session builder: {}", e) })?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(|e| AppError { message: format!("Failed to set optimization level: {}", e) })?
        .with_intra_threads(4)
        .map_err(|e| AppError { message: format!("Failed to set intra threads: {}", e) })?;

    if use_gpu {
        builder = builder.with_execution_providers([
            ort::execution_providers::DirectMLExecutionProvider::default().build(),
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
            ort::execution_providers::CUDAExecutionProvider::default().build(),
            ort::execution_providers::CPUExecutionProvider::default().build(),
        ]).map_err(|e| AppError { message: format!("Failed to register GPU execution providers: {}", e) })?;
    } else {
        builder = builder.with_execution_providers([
            ort::execution_providers::CPUExecutionProvider::default().build(),
        ]).map_err(|e| AppError { message: format!("Failed to register CPU execution provider: {}", e) })?;
    }

    builder.commit_from_file(model_path).map_err(|e| AppError {
        message: format!("Failed to load ONNX model: {}", e),
    })
}

async fn download_file(url: &str, dest: &Path, on_progress: Option<&ProgressFn>) -> Result<(), AppError> {
    let response = reqwest::Client::new().get(url).send().await?;

    if !response.status().is_success() {
        return Err(format!("Failed to download {}: HTTP {}", url, response.status()).into());
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_emit = 0;

    // Write to a temporary name so an interrupted download is never mistaken
    // for a complete file.
    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await.map_err(|e| AppError {
        message: format!("Failed to create file {}: {}", partial.display(), e),
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| AppError {
                message: format!("Failed to write to file: {}", e),
            })?;

        if let Some(report) = on_progress {
            if total_size > 0 {
                let progress = (downloaded * 100) / total_size;
                if progress > last_emit {
                    report(progress);
                    last_emit = progress;
                }
            }
        }
    }
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    drop(file);

    tokio::fs::rename(&partial, dest).await?;
    if let Some(report) = on_progress {
        report(100);
    }
    tracing::debug!(url, bytes = downloaded, "download finished");

    Ok(())
}
