use crate::error::WorkflowError;
use crate::models::classify_types::Prediction;
use crate::models::workflow_types::ImageHandle;
use futures::future::BoxFuture;
use std::sync::Arc;

/// A loaded model that can rank labels for a photo.
///
/// Results come back ordered by descending probability.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: ImageHandle) -> BoxFuture<'static, Result<Vec<Prediction>, WorkflowError>>;
}

/// Produces the [`Classifier`] the workflow uses for the rest of the run.
pub trait ModelProvider: Send + Sync {
    fn load(&self) -> BoxFuture<'static, Result<Arc<dyn Classifier>, WorkflowError>>;
}
