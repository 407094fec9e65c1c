use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::classification::ClassificationService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    classifier: ClassificationService,
}

impl AppState {
    pub(crate) fn new(settings: Settings, classifier: ClassificationService) -> Self {
        Self { inner: Arc::new(InnerState { settings, classifier }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn classifier(&self) -> &ClassificationService {
        &self.inner.classifier
    }
}
