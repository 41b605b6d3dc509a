mod agent;
mod io;

use ollama_provider::config::AppConfig;
use ollama_provider::{register, ProviderRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::load_or_default();
    let mut registry = ProviderRegistry::new();
    register(&mut registry, &config.ollama)?;

    let input = io::input::StdinInput::new();
    let output = io::output::StdoutOutput::new();
    let agent = agent::agent::Agent::new(&registry, "ollama")?;

    agent::runtime::run(input, output, agent).await
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
