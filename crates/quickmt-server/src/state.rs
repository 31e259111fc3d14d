//! Shared application state.
//!
//! Components are `Option`s: endpoints answer 503 until startup has
//! populated them. Nothing here is a global — everything the handlers
//! touch arrives through this struct.

use std::sync::Arc;

use quickmt_langid::LangIdPool;
use quickmt_runtime::{ModelManager, Orchestrator};
use quickmt_settings::Settings;

/// State accessible from every handler.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Option<Arc<Orchestrator>>,
    langid: Option<Arc<LangIdPool>>,
    settings: Arc<Settings>,
}

impl AppState {
    /// Fully initialized state.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        langid: Option<Arc<LangIdPool>>,
        settings: Settings,
    ) -> Self {
        Self {
            orchestrator: Some(orchestrator),
            langid,
            settings: Arc::new(settings),
        }
    }

    /// State with no components yet; every data endpoint answers 503.
    pub fn uninitialized(settings: Settings) -> Self {
        Self {
            orchestrator: None,
            langid: None,
            settings: Arc::new(settings),
        }
    }

    /// The orchestrator, if initialized.
    pub fn orchestrator(&self) -> Option<&Arc<Orchestrator>> {
        self.orchestrator.as_ref()
    }

    /// The model manager, if initialized.
    pub fn manager(&self) -> Option<&Arc<ModelManager>> {
        self.orchestrator.as_ref().map(|o| o.manager())
    }

    /// The langid pool, if initialized.
    pub fn langid(&self) -> Option<&Arc<LangIdPool>> {
        self.langid.as_ref()
    }

    /// Gateway settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
