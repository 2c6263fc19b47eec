//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::generator::Generator;
use crate::renderer::{Renderer, ScriptRenderer};
use crate::store::{self, VideoStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    pub store: Arc<dyn VideoStore>,
    pub generator: Arc<Generator>,
}

impl AppState {
    /// Wires the configured store and the script renderer.
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.proxy.upstream_timeout)
            .build()?;
        let store = store::from_config(&config, http.clone());
        let renderer = Arc::new(ScriptRenderer::new(
            config.render_program.clone(),
            config.render_script.clone(),
            config.render_log.clone(),
        ));
        Ok(Self::with_parts(config, http, store, renderer))
    }

    /// Assembles state from explicit parts, e.g. a fake renderer in tests.
    pub fn with_parts(
        config: AppConfig,
        http: reqwest::Client,
        store: Arc<dyn VideoStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let generator = Arc::new(Generator::new(
            store.clone(),
            renderer,
            config.work_dir.clone(),
            config.background_generation,
        ));
        Self {
            config: Arc::new(config),
            http,
            store,
            generator,
        }
    }
}
