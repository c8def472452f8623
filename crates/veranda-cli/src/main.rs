use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use veranda_agent::{Agent, AgentConfig};
use veranda_client::{ClientPool, EnvCredentials};
use veranda_gateway::GatewayServer;
use veranda_memory::{MemoryAdapter, MemoryScope};
use veranda_session::FileSessionStore;

#[derive(Parser)]
#[command(name = "veranda", about = "Veranda — RAG chat agent gateway")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "veranda.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Answer a single query and exit
    Query {
        /// The question to ask
        text: String,
        /// Skip knowledge-base retrieval
        #[arg(long)]
        no_rag: bool,
    },
}

#[derive(Deserialize)]
struct VerandaConfig {
    #[serde(default)]
    agent: AgentConfig,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default = "default_user_id")]
    user_id: String,
    #[serde(default)]
    server: ServerConfig,
}

impl Default for VerandaConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            data_dir: default_data_dir(),
            user_id: default_user_id(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_user_id() -> String {
    "web_user".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// Environment variables take precedence over the config file, so a
/// deployment can run without any `veranda.toml` at all.
fn apply_env_overrides(config: &mut VerandaConfig, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("VERANDA_MODEL_ID") {
        config.agent.model_id = v;
    }
    if let Some(v) = get("VERANDA_REGION") {
        config.agent.region = v;
    }
    if let Some(v) = get("VERANDA_KNOWLEDGE_BASE_ID") {
        config.agent.knowledge_base_id = Some(v);
    }
    if let Some(v) = get("VERANDA_MEMORY_ID") {
        config.agent.memory_id = Some(v);
    }
}

async fn load_config(path: &PathBuf) -> anyhow::Result<VerandaConfig> {
    let mut config = match tokio::fs::read_to_string(path).await {
        Ok(text) => toml::from_str(&text).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(config = %path.display(), "No config file, using defaults and environment");
            VerandaConfig::default()
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

async fn build_agent(config: &VerandaConfig) -> Arc<Agent> {
    let pool = Arc::new(ClientPool::new(
        config.agent.region.clone(),
        Arc::new(EnvCredentials::default()),
    ));

    let scope = config
        .agent
        .memory_id
        .as_ref()
        .map(|memory_id| MemoryScope::for_user(memory_id.clone(), &config.user_id));
    let memory = MemoryAdapter::detect(pool.clone(), scope).await;

    Arc::new(Agent::new(config.agent.clone(), pool, memory))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let agent = build_agent(&config).await;
            let sessions =
                Arc::new(FileSessionStore::new(config.data_dir.join("sessions")).await?);
            let app = GatewayServer::build(agent, sessions);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Veranda gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Query { text, no_rag } => {
            let agent = build_agent(&config).await;
            let answer = if no_rag || !agent.has_knowledge_base() {
                agent.answer_direct(&text).await
            } else {
                agent.answer(&text, None).await
            };
            println!("{answer}");
        }
    }

    Ok(())
}
