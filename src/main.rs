use clap::{Parser, Subcommand};
use flyagent::config::{AppConfig, LlmBackend, SearchBackend, StorageBackend};
use flyagent::language::ProviderLanguageModel;
use flyagent::search::{AmadeusClient, AmadeusConfig, FlightSearch, StaticFlightSearch};
use flyagent::storage::{InMemoryThreadStore, ThreadStore};
use flyagent::types::ThreadId;
use flyagent::{
    logging, server, AgentError, AnthropicProvider, FlightAgent, LLMProvider, OpenAIProvider,
    Result,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "flyagent", version, about = "Flight-booking assistant")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "FLYAGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat on stdin (default)
    Chat {
        /// Resume or name a thread
        #[arg(long)]
        thread_id: Option<String>,
    },
    /// Serve the HTTP API
    Serve {
        /// Listen address, overrides the configuration
        #[arg(long, env = "FLYAGENT_BIND")]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Lỗi: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(config.log_level)?;

    let agent = Arc::new(build_agent(&config).await?);

    match cli.command.unwrap_or(Command::Chat { thread_id: None }) {
        Command::Chat { thread_id } => {
            let thread_id = thread_id.map(ThreadId::from).unwrap_or_default();
            chat(&agent, thread_id).await
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            server::serve(agent, &bind, shutdown_signal()).await
        }
    }
}

fn build_provider(config: &AppConfig) -> Result<Arc<dyn LLMProvider>> {
    let llm = &config.llm;
    let provider: Arc<dyn LLMProvider> = match llm.provider {
        LlmBackend::OpenAI => {
            let mut provider = OpenAIProvider::from_env()?;
            if let Some(model) = &llm.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(temperature) = llm.temperature {
                provider = provider.with_temperature(temperature);
            }
            if let Some(max_tokens) = llm.max_tokens {
                provider = provider.with_max_tokens(max_tokens);
            }
            Arc::new(provider)
        }
        LlmBackend::Anthropic => {
            let mut provider = AnthropicProvider::from_env()?;
            if let Some(model) = &llm.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(temperature) = llm.temperature {
                provider = provider.with_temperature(temperature);
            }
            if let Some(max_tokens) = llm.max_tokens {
                provider = provider.with_max_tokens(max_tokens);
            }
            Arc::new(provider)
        }
    };
    Ok(provider)
}

fn build_search(config: &AppConfig) -> Result<Arc<dyn FlightSearch>> {
    let search = &config.search;
    let backend: Arc<dyn FlightSearch> = match search.backend {
        SearchBackend::Static => Arc::new(StaticFlightSearch::new()),
        SearchBackend::Amadeus => {
            let amadeus = AmadeusConfig::from_env()?
                .with_max_results(search.max_results)
                .with_currency(search.currency.clone())
                .with_non_stop(search.non_stop);
            Arc::new(AmadeusClient::new(amadeus)?)
        }
    };
    Ok(backend)
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn ThreadStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryThreadStore::new())),
        #[cfg(feature = "redis-storage")]
        StorageBackend::Redis => {
            let url = config.storage.redis_url.as_deref().ok_or_else(|| {
                AgentError::Configuration("storage.redis_url is required for redis".to_string())
            })?;
            Ok(Arc::new(flyagent::storage::RedisThreadStore::connect(url).await?))
        }
        #[cfg(not(feature = "redis-storage"))]
        StorageBackend::Redis => Err(AgentError::Configuration(
            "redis storage requires the `redis-storage` feature".to_string(),
        )),
    }
}

async fn build_agent(config: &AppConfig) -> Result<FlightAgent> {
    let provider = build_provider(config)?;
    info!(
        provider = %provider.name(),
        search = ?config.search.backend,
        storage = ?config.storage.backend,
        "Starting flyagent"
    );

    FlightAgent::builder()
        .language_model(Arc::new(ProviderLanguageModel::new(provider)))
        .flight_search(build_search(config)?)
        .thread_store(build_store(config).await?)
        .config(config.agent.clone())
        .build()
        .await
}

async fn chat(agent: &FlightAgent, thread_id: ThreadId) -> Result<()> {
    println!("Chatbot đã sẵn sàng. Gõ 'thoát' để kết thúc.");
    println!("Chatbot: {}", agent.greeting());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Bạn: ");
        std::io::stdout()
            .flush()
            .map_err(|e| AgentError::Internal(format!("stdout: {e}")))?;

        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AgentError::Internal(format!("stdin: {e}")))?
        else {
            break;
        };

        let input = line.trim();
        if matches!(input.to_lowercase().as_str(), "thoát" | "exit") {
            println!("Chatbot: Tạm biệt!");
            break;
        }
        if input.is_empty() {
            continue;
        }

        match agent.process_message(&thread_id, input).await {
            Ok(reply) => println!("Chatbot: {}", reply.response),
            Err(e) => eprintln!("Lỗi: {e}"),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
