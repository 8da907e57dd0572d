use crate::error::{AppError, WorkflowError};
use crate::models::classify_types::Prediction;
use crate::models::workflow_types::ImageHandle;
use crate::services::classifier::model_manager::ModelType;
use crate::workflow::provider::Classifier;
use futures::future::BoxFuture;
use futures::FutureExt;
use image::{DynamicImage, ImageReader};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

const CROP_PCT: f32 = 0.875;

/// A loaded ONNX session plus the labels of its output classes.
#[derive(Clone)]
pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    labels: Arc<Vec<String>>,
    model_type: ModelType,
    top_k: usize,
}

impl OnnxClassifier {
    pub fn new(session: Session, labels: Vec<String>, model_type: ModelType, top_k: usize) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            labels: Arc::new(labels),
            model_type,
            top_k,
        }
    }

    fn classify_blocking(&self, path: &Path) -> Result<Vec<Prediction>, AppError> {
        let (mean, std) = self.model_type.normalization();
        let tensor = preprocess_image(path, self.model_type.crop_size(), mean, std)?;

        let logits = {
            let mut session = self.session.lock().map_err(|_| AppError {
                message: "Model session lock poisoned".to_string(),
            })?;
            run_session(&mut session, tensor)?
        };

        Ok(rank(&logits, &self.labels, self.top_k))
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: ImageHandle) -> BoxFuture<'static, Result<Vec<Prediction>, WorkflowError>> {
        let classifier = self.clone();

        async move {
            tokio::task::spawn_blocking(move || classifier.classify_blocking(&image.path))
                .await
                .map_err(|e| WorkflowError::ClassificationFailure(format!("Task join failed: {}", e)))?
                .map_err(|e| WorkflowError::ClassificationFailure(e.message))
        }
        .boxed()
    }
}

pub fn preprocess_image(path: &Path, crop_size: u32, mean: [f32; 3], std: [f32; 3]) -> Result<Array4<f32>, AppError> {
    let img = ImageReader::open(path)
        .map_err(|e| AppError {
            message: format!("Failed to open image {}: {}", path.display(), e),
        })?
        .with_guessed_format()
        .map_err(|e| AppError {
            message: format!("Failed to read image {}: {}", path.display(), e),
        })?
        .decode()
        .map_err(|e| AppError {
            message: format!("Failed to decode image {}: {}", path.display(), e),
        })?;

    to_tensor(&img, crop_size, mean, std)
}

/// Resizes the shortest edge to `ceil(crop_size / 0.875)`, center-crops to
/// `crop_size` and normalizes into a `1x3xHxW` tensor.
pub fn to_tensor(img: &DynamicImage, crop_size: u32, mean: [f32; 3], std: [f32; 3]) -> Result<Array4<f32>, AppError> {
    let resize_size = (crop_size as f32 / CROP_PCT).ceil() as u32;
    let (w, h) = (img.width().max(1), img.height().max(1));
    let (new_w, new_h) = if w < h {
        (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
    };
    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let crop_x = (new_w.saturating_sub(crop_size)) / 2;
    let crop_y = (new_h.saturating_sub(crop_size)) / 2;
    let rgb = resized.crop_imm(crop_x, crop_y, crop_size, crop_size).to_rgb8();

    let side = crop_size as usize;
    let hw = side * side;
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            data[c * hw + i] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }

    Array4::from_shape_vec((1, 3, side, side), data).map_err(|e| AppError {
        message: format!("Failed to create tensor: {}", e),
    })
}

fn run_session(session: &mut Session, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
    let input_name = session.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input)
        .map_err(|e| AppError { message: format!("Failed to create tensor value: {}", e) })?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError {
            message: format!("Inference failed: {}", e),
        })?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| AppError {
            message: "Model produced no outputs".to_string(),
        })?;

    let (_, data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError {
            message: format!("Failed to extract output tensor: {}", e),
        })?;

    Ok(data.iter().copied().collect())
}

/// Softmax over `logits`, then the `top_k` most probable labels in
/// descending order.
pub fn rank(logits: &[f32], labels: &[String], top_k: usize) -> Vec<Prediction> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();

    let mut indexed: Vec<(usize, f32)> = logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .enumerate()
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(top_k);

    indexed
        .into_iter()
        .map(|(idx, probability)| {
            let label = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx));
            Prediction::new(label, probability)
        })
        .collect()
}
