//! The process-wide runtime behind the exported functions.

use std::sync::Arc;

use isobridge_content::ContentEngine;
use isobridge_core::error::ContentError;
use isobridge_core::{init_logging, BridgeConfig, Result};
use isobridge_isolation::IsolationRuntime;
use once_cell::sync::OnceCell;

use crate::loader::BridgeLoader;

static RUNTIME: OnceCell<IsolationRuntime> = OnceCell::new();

/// The process-wide runtime, started on first use.
///
/// Startup reads the configuration named by `ISOBRIDGE_CONFIG`, installs
/// logging and loads the component image into the root domain.
pub fn runtime() -> Result<&'static IsolationRuntime> {
    RUNTIME.get_or_try_init(|| {
        let config = BridgeConfig::from_env()?;
        init_logging(&config.logging);
        let loader = BridgeLoader::new(config.component_type.clone());
        IsolationRuntime::new(config, Arc::new(loader))
    })
}

/// The content engine of the domain the calling thread executes in.
pub fn engine() -> Result<Arc<ContentEngine>> {
    runtime()?
        .services::<ContentEngine>()
        .ok_or_else(|| ContentError::NotInitialized.into())
}
