//! The workflow controller: sole owner of the current state and the session.
//!
//! Each state binds exactly one action. [`WorkflowController::dispatch`] looks
//! the action up from the current state, so an action bound to any other state
//! cannot run. The busy states (`LoadingModel`, `Classifying`) bind a no-op,
//! which keeps at most one external call outstanding.
//!
//! Long-running work is handed back to the caller as a [`Dispatch::Spawned`]
//! future. Whoever drives the controller awaits it and feeds the resulting
//! [`Completion`] into [`WorkflowController::apply`].

use crate::error::WorkflowError;
use crate::models::classify_types::Prediction;
use crate::models::workflow_types::{ActionView, ImageHandle, WorkflowView};
use crate::services::formatter;
use crate::workflow::provider::{Classifier, ModelProvider};
use crate::workflow::session::Session;
use crate::workflow::state::{transition, Event, WorkflowState, INITIAL_STATE};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

/// Action bound to a workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    LoadModel,
    UploadPhoto,
    IdentifyBreed,
    Reset,
    /// Busy state; the button is shown disabled with the given label.
    Wait(&'static str),
}

impl Action {
    pub const fn for_state(state: WorkflowState) -> Action {
        match state {
            WorkflowState::Initial => Action::LoadModel,
            WorkflowState::LoadingModel => Action::Wait("Loading model..."),
            WorkflowState::AwaitingUpload => Action::UploadPhoto,
            WorkflowState::Ready => Action::IdentifyBreed,
            WorkflowState::Classifying => Action::Wait("Identifying..."),
            WorkflowState::Complete => Action::Reset,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Action::LoadModel => "Load model",
            Action::UploadPhoto => "Upload photo",
            Action::IdentifyBreed => "Identify breed",
            Action::Reset => "Reset",
            Action::Wait(label) => label,
        }
    }

    pub const fn enabled(self) -> bool {
        !matches!(self, Action::Wait(_))
    }
}

/// Result of an external call started by [`Dispatch::Spawned`].
pub enum Completion {
    ModelLoaded(Result<Arc<dyn Classifier>, WorkflowError>),
    Classified(Result<Vec<Prediction>, WorkflowError>),
}

impl Completion {
    fn kind(&self) -> &'static str {
        match self {
            Completion::ModelLoaded(_) => "model_loaded",
            Completion::Classified(_) => "classified",
        }
    }
}

/// What a dispatched action asks of its caller.
pub enum Dispatch {
    /// An external call is in flight; its completion must be applied.
    Spawned(BoxFuture<'static, Completion>),
    /// The file-selection surface should be opened.
    OpenFilePicker,
    /// The session was reset synchronously.
    Reset,
    /// Nothing happened.
    Ignored,
}

pub struct WorkflowController {
    state: WorkflowState,
    session: Session,
    provider: Arc<dyn ModelProvider>,
    failure: Option<WorkflowError>,
}

impl WorkflowController {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            state: INITIAL_STATE,
            session: Session::default(),
            provider,
            failure: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn failure(&self) -> Option<&WorkflowError> {
        self.failure.as_ref()
    }

    fn advance(&mut self) {
        let from = self.state;
        self.state = transition(from, Event::Next);
        tracing::debug!(from = %from, to = %self.state, "workflow transition");
    }

    /// Runs the action bound to `bound_to` if, and only if, it is the current
    /// state. Stale triggers from an outdated UI are ignored.
    #[tracing::instrument(skip(self), fields(current = %self.state))]
    pub fn dispatch(&mut self, bound_to: WorkflowState) -> Dispatch {
        if bound_to != self.state {
            tracing::debug!("ignoring action bound to a stale state");
            return Dispatch::Ignored;
        }

        match Action::for_state(self.state) {
            Action::LoadModel => self.load_model(),
            Action::UploadPhoto => Dispatch::OpenFilePicker,
            Action::IdentifyBreed => self.identify(),
            Action::Reset => {
                self.reset();
                Dispatch::Reset
            }
            Action::Wait(_) => {
                tracing::debug!("action is disabled while busy");
                Dispatch::Ignored
            }
        }
    }

    fn load_model(&mut self) -> Dispatch {
        self.advance();
        let load = self.provider.load();
        Dispatch::Spawned(load.map(Completion::ModelLoaded).boxed())
    }

    fn identify(&mut self) -> Dispatch {
        let (Some(model), Some(image)) = (self.session.model.clone(), self.session.image.clone())
        else {
            tracing::warn!("ready without a model or photo; ignoring identify");
            return Dispatch::Ignored;
        };

        self.advance();
        tracing::info!(file = %image.file_name, "identifying breed");
        Dispatch::Spawned(model.classify(image).map(Completion::Classified).boxed())
    }

    fn reset(&mut self) {
        self.session.clear_upload();
        self.advance();
    }

    /// Completion callback of the file-selection surface. The first file
    /// becomes the session photo; an empty selection changes nothing.
    ///
    /// Returns whether the workflow advanced.
    pub fn upload(&mut self, files: Vec<ImageHandle>) -> bool {
        if self.state != WorkflowState::AwaitingUpload {
            tracing::debug!(state = %self.state, "ignoring upload outside awaitingUpload");
            return false;
        }

        let Some(first) = files.into_iter().next() else {
            tracing::debug!("empty file selection");
            return false;
        };

        tracing::info!(file = %first.file_name, "photo selected");
        self.session.image = Some(first);
        self.advance();
        true
    }

    /// Applies the outcome of a spawned call. A failure is recorded and the
    /// state is left where it is.
    pub fn apply(&mut self, completion: Completion) {
        match (self.state, completion) {
            (WorkflowState::LoadingModel, Completion::ModelLoaded(Ok(model))) => {
                tracing::info!("model loaded");
                self.session.model = Some(model);
                self.advance();
            }
            (WorkflowState::Classifying, Completion::Classified(Ok(results))) => {
                tracing::info!(count = results.len(), "classification complete");
                self.session.results = results;
                self.advance();
            }
            (
                WorkflowState::LoadingModel,
                Completion::ModelLoaded(Err(err)),
            )
            | (
                WorkflowState::Classifying,
                Completion::Classified(Err(err)),
            ) => {
                tracing::error!(error = %err, state = %self.state, "workflow action failed");
                self.failure = Some(err);
            }
            (state, completion) => {
                tracing::warn!(state = %state, completion = completion.kind(), "dropping unexpected completion");
            }
        }
    }

    pub fn view(&self) -> WorkflowView {
        let descriptor = self.state.descriptor();
        let action = Action::for_state(self.state);

        WorkflowView {
            state: self.state,
            action: ActionView {
                label: action.label(),
                enabled: action.enabled() && self.failure.is_none(),
            },
            show_image: descriptor.show_image,
            show_results: descriptor.show_results,
            image: if descriptor.show_image {
                self.session.image.clone()
            } else {
                None
            },
            results: if descriptor.show_results {
                formatter::format_results(&self.session.results)
            } else {
                Vec::new()
            },
            error: self.failure.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::photo_service;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) struct FakeClassifier {
        pub results: Result<Vec<Prediction>, WorkflowError>,
        pub calls: Arc<Mutex<Vec<ImageHandle>>>,
    }

    impl Classifier for FakeClassifier {
        fn classify(&self, image: ImageHandle) -> BoxFuture<'static, Result<Vec<Prediction>, WorkflowError>> {
            self.calls.lock().unwrap().push(image);
            let results = self.results.clone();
            async move { results }.boxed()
        }
    }

    pub(crate) struct FakeProvider {
        pub loads: Arc<AtomicUsize>,
        pub fail_load: bool,
        pub results: Result<Vec<Prediction>, WorkflowError>,
        pub calls: Arc<Mutex<Vec<ImageHandle>>>,
    }

    impl FakeProvider {
        pub fn returning(results: Vec<Prediction>) -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                fail_load: false,
                results: Ok(results),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ModelProvider for FakeProvider {
        fn load(&self) -> BoxFuture<'static, Result<Arc<dyn Classifier>, WorkflowError>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_load {
                return async { Err(WorkflowError::ModelLoadFailure("no weights".into())) }.boxed();
            }

            let classifier: Arc<dyn Classifier> = Arc::new(FakeClassifier {
                results: self.results.clone(),
                calls: self.calls.clone(),
            });
            async move { Ok(classifier) }.boxed()
        }
    }

    fn photo(name: &str) -> ImageHandle {
        ImageHandle::from_path(format!("/photos/{name}"))
    }

    async fn run(controller: &mut WorkflowController) {
        match controller.dispatch(controller.state()) {
            Dispatch::Spawned(job) => {
                let completion = job.await;
                controller.apply(completion);
            }
            _ => panic!("expected a spawned job"),
        }
    }

    async fn ready_controller(provider: FakeProvider) -> WorkflowController {
        let mut controller = WorkflowController::new(Arc::new(provider));
        run(&mut controller).await;
        assert!(controller.upload(vec![photo("rex.jpg")]));
        controller
    }

    #[tokio::test]
    async fn load_model_moves_through_loading_to_awaiting_upload() {
        let provider = FakeProvider::returning(vec![]);
        let loads = provider.loads.clone();
        let mut controller = WorkflowController::new(Arc::new(provider));

        let Dispatch::Spawned(job) = controller.dispatch(WorkflowState::Initial) else {
            panic!("expected a spawned job");
        };
        assert_eq!(controller.state(), WorkflowState::LoadingModel);
        assert!(controller.session().model().is_none());

        controller.apply(job.await);
        assert_eq!(controller.state(), WorkflowState::AwaitingUpload);
        assert!(controller.session().model().is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn busy_states_ignore_their_action() {
        let provider = FakeProvider::returning(vec![Prediction::new("pug", 0.5)]);
        let loads = provider.loads.clone();
        let calls = provider.calls.clone();
        let mut controller = WorkflowController::new(Arc::new(provider));

        let Dispatch::Spawned(load) = controller.dispatch(WorkflowState::Initial) else {
            panic!("expected a spawned job");
        };
        assert!(matches!(controller.dispatch(WorkflowState::LoadingModel), Dispatch::Ignored));
        assert_eq!(controller.state(), WorkflowState::LoadingModel);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        controller.apply(load.await);

        controller.upload(vec![photo("rex.jpg")]);
        let Dispatch::Spawned(classify) = controller.dispatch(WorkflowState::Ready) else {
            panic!("expected a spawned job");
        };
        assert!(matches!(controller.dispatch(WorkflowState::Classifying), Dispatch::Ignored));
        assert_eq!(controller.state(), WorkflowState::Classifying);
        assert!(controller.session().results().is_empty());
        assert_eq!(calls.lock().unwrap().len(), 1);
        controller.apply(classify.await);
        assert_eq!(controller.state(), WorkflowState::Complete);
    }

    #[tokio::test]
    async fn stale_triggers_never_execute() {
        let provider = FakeProvider::returning(vec![]);
        let loads = provider.loads.clone();
        let mut controller = WorkflowController::new(Arc::new(provider));

        for stale in [WorkflowState::Ready, WorkflowState::Complete, WorkflowState::AwaitingUpload] {
            assert!(matches!(controller.dispatch(stale), Dispatch::Ignored));
        }
        assert_eq!(controller.state(), WorkflowState::Initial);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn awaiting_upload_asks_for_the_file_picker() {
        let mut controller = WorkflowController::new(Arc::new(FakeProvider::returning(vec![])));
        run(&mut controller).await;

        assert!(matches!(
            controller.dispatch(WorkflowState::AwaitingUpload),
            Dispatch::OpenFilePicker
        ));
        assert_eq!(controller.state(), WorkflowState::AwaitingUpload);
    }

    #[tokio::test]
    async fn empty_upload_is_a_no_op() {
        let mut controller = WorkflowController::new(Arc::new(FakeProvider::returning(vec![])));
        run(&mut controller).await;

        assert!(!controller.upload(Vec::new()));
        assert_eq!(controller.state(), WorkflowState::AwaitingUpload);
        assert!(controller.session().image().is_none());
    }

    #[tokio::test]
    async fn upload_keeps_only_the_first_file() {
        let mut controller = WorkflowController::new(Arc::new(FakeProvider::returning(vec![])));
        run(&mut controller).await;

        assert!(controller.upload(vec![photo("first.jpg"), photo("second.jpg")]));
        assert_eq!(controller.state(), WorkflowState::Ready);
        assert_eq!(controller.session().image(), Some(&photo("first.jpg")));
    }

    #[test]
    fn upload_before_the_model_is_loaded_is_ignored() {
        let mut controller = WorkflowController::new(Arc::new(FakeProvider::returning(vec![])));

        assert!(!controller.upload(vec![photo("rex.jpg")]));
        assert_eq!(controller.state(), WorkflowState::Initial);
        assert!(controller.session().image().is_none());
    }

    #[tokio::test]
    async fn upload_after_a_photo_is_chosen_is_ignored() {
        let mut controller = ready_controller(FakeProvider::returning(vec![Prediction::new("pug", 0.5)])).await;

        assert!(!controller.upload(vec![photo("other.jpg")]));
        assert_eq!(controller.state(), WorkflowState::Ready);
        assert_eq!(controller.session().image(), Some(&photo("rex.jpg")));

        let Dispatch::Spawned(classify) = controller.dispatch(WorkflowState::Ready) else {
            panic!("expected a spawned job");
        };
        assert!(!controller.upload(vec![photo("other.jpg")]));
        assert_eq!(controller.state(), WorkflowState::Classifying);
        assert_eq!(controller.session().image(), Some(&photo("rex.jpg")));

        controller.apply(classify.await);
        assert!(!controller.upload(vec![photo("other.jpg")]));
        assert_eq!(controller.state(), WorkflowState::Complete);
        assert_eq!(controller.session().image(), Some(&photo("rex.jpg")));
        assert_eq!(controller.session().results(), [Prediction::new("pug", 0.5)]);
    }

    #[tokio::test]
    async fn non_image_files_never_reach_ready() {
        let mut controller = WorkflowController::new(Arc::new(FakeProvider::returning(vec![])));
        run(&mut controller).await;

        assert!(!controller.upload(photo_service::image_handles(["/photos/notes.txt"])));
        assert_eq!(controller.state(), WorkflowState::AwaitingUpload);
        assert!(controller.session().image().is_none());

        assert!(controller.upload(photo_service::image_handles(["/photos/notes.txt", "/photos/rex.jpg"])));
        assert_eq!(controller.state(), WorkflowState::Ready);
        assert_eq!(controller.session().image(), Some(&photo("rex.jpg")));
    }

    #[tokio::test]
    async fn identify_classifies_the_uploaded_photo() {
        let provider = FakeProvider::returning(vec![Prediction::new("pug", 0.5)]);
        let calls = provider.calls.clone();
        let mut controller = ready_controller(provider).await;

        run(&mut controller).await;
        assert_eq!(controller.state(), WorkflowState::Complete);
        assert_eq!(controller.session().results(), [Prediction::new("pug", 0.5)]);
        assert_eq!(*calls.lock().unwrap(), vec![photo("rex.jpg")]);
    }

    #[tokio::test]
    async fn reset_clears_the_upload_but_keeps_the_model() {
        let mut controller = ready_controller(FakeProvider::returning(vec![Prediction::new("pug", 0.5)])).await;
        run(&mut controller).await;
        let model = controller.session().model().cloned().unwrap();

        assert!(matches!(controller.dispatch(WorkflowState::Complete), Dispatch::Reset));
        assert_eq!(controller.state(), WorkflowState::AwaitingUpload);
        assert!(controller.session().image().is_none());
        assert!(controller.session().results().is_empty());
        assert!(Arc::ptr_eq(controller.session().model().unwrap(), &model));
    }

    #[tokio::test]
    async fn load_failure_is_reported_and_does_not_advance() {
        let mut provider = FakeProvider::returning(vec![]);
        provider.fail_load = true;
        let mut controller = WorkflowController::new(Arc::new(provider));

        run(&mut controller).await;
        assert_eq!(controller.state(), WorkflowState::LoadingModel);
        assert!(controller.session().model().is_none());
        assert_eq!(
            controller.failure(),
            Some(&WorkflowError::ModelLoadFailure("no weights".into()))
        );

        let view = controller.view();
        assert!(!view.action.enabled);
        assert_eq!(view.error.as_deref(), Some("failed to load model: no weights"));
    }

    #[tokio::test]
    async fn classification_failure_is_reported_and_does_not_advance() {
        let mut provider = FakeProvider::returning(vec![]);
        provider.results = Err(WorkflowError::ClassificationFailure("bad tensor".into()));
        let mut controller = ready_controller(provider).await;

        run(&mut controller).await;
        assert_eq!(controller.state(), WorkflowState::Classifying);
        assert!(controller.session().results().is_empty());
        assert!(matches!(controller.failure(), Some(WorkflowError::ClassificationFailure(_))));
    }

    #[tokio::test]
    async fn mismatched_completions_are_dropped() {
        let mut controller = WorkflowController::new(Arc::new(FakeProvider::returning(vec![])));

        controller.apply(Completion::Classified(Ok(vec![Prediction::new("pug", 0.5)])));
        assert_eq!(controller.state(), WorkflowState::Initial);
        assert!(controller.session().results().is_empty());
    }

    #[tokio::test]
    async fn view_follows_the_state_flags() {
        let mut controller = ready_controller(FakeProvider::returning(vec![Prediction::new("pug", 0.5)])).await;

        let view = controller.view();
        assert_eq!(view.action.label, "Identify breed");
        assert!(view.show_image && !view.show_results);
        assert_eq!(view.image, Some(photo("rex.jpg")));
        assert!(view.results.is_empty());

        run(&mut controller).await;
        let view = controller.view();
        assert!(view.show_image && view.show_results);
        assert_eq!(view.results[0].label, "Pug");
        assert_eq!(view.results[0].percentage, "50.00 %");
        assert_eq!(view.action.label, "Reset");
    }

    #[test]
    fn every_state_binds_one_labelled_action() {
        let labels: Vec<_> = WorkflowState::ALL
            .iter()
            .map(|s| (Action::for_state(*s).label(), Action::for_state(*s).enabled()))
            .collect();

        assert_eq!(
            labels,
            [
                ("Load model", true),
                ("Loading model...", false),
                ("Upload photo", true),
                ("Identify breed", true),
                ("Identifying...", false),
                ("Reset", true),
            ]
        );
    }
}
