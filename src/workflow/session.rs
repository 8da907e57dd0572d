use crate::models::classify_types::Prediction;
use crate::models::workflow_types::ImageHandle;
use crate::workflow::provider::Classifier;
use std::fmt;
use std::sync::Arc;

/// Data bound to one run of the workflow. Only the controller mutates it.
#[derive(Default)]
pub struct Session {
    pub(crate) model: Option<Arc<dyn Classifier>>,
    pub(crate) image: Option<ImageHandle>,
    pub(crate) results: Vec<Prediction>,
}

impl Session {
    pub fn model(&self) -> Option<&Arc<dyn Classifier>> {
        self.model.as_ref()
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    pub fn results(&self) -> &[Prediction] {
        &self.results
    }

    /// Drops the photo and its results. The model stays loaded.
    pub(crate) fn clear_upload(&mut self) {
        self.results.clear();
        self.image = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("model_loaded", &self.model.is_some())
            .field("image", &self.image)
            .field("results", &self.results)
            .finish()
    }
}
