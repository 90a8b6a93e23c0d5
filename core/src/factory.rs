use crate::config::Config;
use anyhow::{Context, Result};
use kore_bridge::{Bridge, LLMProvider, OllamaProvider, SCRouterProvider};
use kore_mind::Mind;
use sc_router::ToolCatalog;
use std::sync::Arc;

fn ollama(config: &Config, model: &str) -> OllamaProvider {
    let mut provider = OllamaProvider::new().with_model(model);
    if let Some(base_url) = &config.provider.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    provider
}

/// Builds the configured provider. With a `complex_model` set, the simple and
/// complex models sit behind an [`SCRouterProvider`] over the configured
/// catalog.
pub fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let simple = ollama(config, &config.provider.model);

    match &config.provider.complex_model {
        Some(complex_model) if complex_model != &config.provider.model => {
            let catalog = load_catalog(config)?;
            tracing::debug!(
                simple = %config.provider.model,
                complex = %complex_model,
                tools = catalog.len(),
                "Using SC routing provider"
            );
            Ok(Arc::new(SCRouterProvider::new(
                catalog,
                Arc::new(simple),
                Arc::new(ollama(config, complex_model)),
            )))
        }
        _ => Ok(Arc::new(simple)),
    }
}

/// The configured tool catalog, or an empty one when none is set.
pub fn load_catalog(config: &Config) -> Result<ToolCatalog> {
    match &config.catalog {
        Some(path) => ToolCatalog::load(path)
            .with_context(|| format!("Failed to load tool catalog from {}", path.display())),
        None => Ok(ToolCatalog::new()),
    }
}

pub fn open_mind(config: &Config) -> Result<Arc<Mind>> {
    let path = config.database_path();
    let mind = Mind::open(&path)
        .with_context(|| format!("Failed to open mind at {}", path.display()))?;
    Ok(Arc::new(mind))
}

pub fn create_bridge(config: &Config) -> Result<Bridge> {
    let mind = open_mind(config)?;
    let provider = create_provider(config)?;
    Ok(Bridge::new(mind, provider).with_config(config.bridge.clone()))
}
