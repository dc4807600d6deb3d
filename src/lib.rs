pub mod agents;
pub mod app;
pub mod chat;
pub mod clock;
pub mod config;
pub mod documents;
pub mod error;
pub mod model;
pub mod notifications;
pub mod providers;
pub mod store;
pub mod transitions;

use anyhow::Result;

pub use error::{EntityKind, OrchestrationError};

pub async fn run() -> Result<()> {
    let config = config::AssistantConfig::load()?;
    let mut app = app::Application::new(config);
    app.run().await?;
    Ok(())
}
