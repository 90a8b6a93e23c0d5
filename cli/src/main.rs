use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use futures_util::StreamExt;
use kore_bridge::ProviderEvent;
use kore_mind::MemoryType;
use kore_stack::config::{self, Config};
use kore_stack::{Subsystem, factory};
use std::io::Write;

mod init;
mod logger;

#[derive(Parser)]
#[command(name = "kore")]
#[command(version = kore_stack::VERSION)]
#[command(about = "kore - persistent memory and smart routing for local LLMs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup
    Init,
    /// Show the stack, configuration and mind state
    Info,
    /// Store a memory
    Remember {
        content: Vec<String>,
        #[arg(short = 't', long = "type", default_value = "semantic")]
        memory_type: String,
        #[arg(short, long)]
        salience: Option<f64>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Search memories
    Recall {
        query: Vec<String>,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Drop memories whose strength fell below the threshold
    Forget {
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Rebuild identity from memories
    Reflect {
        /// Derive identity locally without asking the model
        #[arg(long)]
        offline: bool,
    },
    /// Show how a query would be routed against the tool catalog
    Route {
        query: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Ask the model, with memory
    Ask {
        prompt: Vec<String>,
        #[arg(long)]
        stream: bool,
    },
    /// Recent trace events
    Traces {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

fn joined(words: &[String]) -> Result<String> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        anyhow::bail!("Nothing to do: text is empty");
    }
    Ok(text)
}

fn info(config: &Config) -> Result<()> {
    let namespace = kore_stack::load_aggregator()?;
    println!(
        "{} {}",
        style("kore-stack").cyan().bold(),
        namespace.version()
    );
    for subsystem in Subsystem::ALL {
        println!(
            "  {} {} ({})",
            style(subsystem).green(),
            namespace.subsystem_version(subsystem).unwrap_or("?"),
            namespace.names_from(subsystem).join(", ")
        );
    }

    println!();
    println!("{}", style("Configuration").cyan().bold());
    println!("  config   {}", config::get_config_path().display());
    println!("  model    {}", config.provider.model);
    if let Some(complex) = &config.provider.complex_model {
        println!("  complex  {}", complex);
    }
    if let Some(catalog) = &config.catalog {
        println!("  catalog  {}", catalog.display());
    }

    let mind = factory::open_mind(config)?;
    let stats = mind.cache_stats()?;
    println!();
    println!("{}", style("Mind").cyan().bold());
    println!("  database {}", config.database_path().display());
    println!("  memories {}", mind.count()?);
    for memory_type in MemoryType::ALL {
        let count = mind.memories(Some(memory_type))?.len();
        if count > 0 {
            println!("    {:<11}{}", memory_type.as_str(), count);
        }
    }
    println!("  cache    {} entries, {} hits", stats.entries, stats.hits);
    if let Some(identity) = mind.identity()? {
        println!();
        println!("{}", identity.to_prompt());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose)?;
    tracing::debug!(
        version = kore_stack::VERSION,
        home = %config::get_kore_dir().display(),
        "kore starting"
    );

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Init
        } else {
            Commands::Info
        }
    });

    let load = Config::load_or_init;

    match command {
        Commands::Init => {
            let init_config = init::run_init().await.map_err(|e| {
                eprintln!("{} Setup failed: {}", style("✗").red(), e);
                anyhow::anyhow!("Setup failed: {}", e)
            })?;
            config::save_config(&init_config)?;
        }
        Commands::Info => info(&load()?)?,
        Commands::Remember {
            content,
            memory_type,
            salience,
            tags,
            source,
        } => {
            let memory_type: MemoryType = memory_type.parse()?;
            let mind = factory::open_mind(&load()?)?;
            let memory = mind.experience_with(
                &joined(&content)?,
                memory_type,
                source.as_deref(),
                salience.unwrap_or(kore_mind::mind::DEFAULT_SALIENCE),
                &tags,
            )?;
            println!(
                "{} Remembered [{}] {}",
                style("✓").green(),
                memory.memory_type,
                style(&memory.id).dim()
            );
        }
        Commands::Recall { query, limit } => {
            let mind = factory::open_mind(&load()?)?;
            let results = mind.recall(&query.join(" "), limit)?;
            if results.is_empty() {
                println!("{}", style("No memories found.").dim());
            }
            for (memory, score) in results {
                println!(
                    "{} [{}] {}",
                    style(format!("{:.2}", score)).cyan(),
                    memory.memory_type,
                    memory.content
                );
            }
        }
        Commands::Forget { threshold } => {
            let config = load()?;
            let mind = factory::open_mind(&config)?;
            let threshold = threshold.unwrap_or(config.forget_threshold);
            let removed = mind.forget(threshold)?;
            println!(
                "{} Forgot {} memories below strength {:.2}",
                style("✓").green(),
                removed,
                threshold
            );
        }
        Commands::Reflect { offline } => {
            let config = load()?;
            let identity = if offline {
                factory::open_mind(&config)?.reflect()?
            } else {
                factory::create_bridge(&config)?.reflect().await?
            };
            println!("{}", identity.to_prompt());
        }
        Commands::Route { query, json } => {
            let catalog = factory::load_catalog(&load()?)?;
            let routing = kore_stack::route(&joined(&query)?, &catalog);
            if json {
                println!("{}", serde_json::to_string_pretty(&routing)?);
            } else {
                println!(
                    "{} {} ({:.2})",
                    style(routing.level).cyan().bold(),
                    routing.strategy,
                    routing.confidence
                );
                if !routing.tools.is_empty() {
                    println!("  tools  {}", routing.tools.join(" -> "));
                }
                println!("  reason {}", routing.reason);
            }
        }
        Commands::Ask { prompt, stream } => {
            let prompt = joined(&prompt)?;
            let bridge = factory::create_bridge(&load()?)?;
            if stream {
                let mut events = bridge.think_stream(&prompt).await?;
                let mut stdout = std::io::stdout();
                while let Some(event) = events.next().await {
                    match event {
                        ProviderEvent::Token(token) => {
                            print!("{}", token);
                            let _ = stdout.flush();
                        }
                        ProviderEvent::Thinking(_) => {}
                        ProviderEvent::Error(e) => {
                            println!();
                            anyhow::bail!("Answer cut off: {}", e);
                        }
                        ProviderEvent::Done => break,
                    }
                }
                println!();
            } else {
                println!("{}", bridge.think(&prompt).await?);
            }
        }
        Commands::Traces { limit } => {
            let mind = factory::open_mind(&load()?)?;
            for trace in mind.traces(limit)? {
                println!(
                    "{} {:<12} {}",
                    style(trace.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
                    trace.kind,
                    trace.detail
                );
            }
        }
    }

    Ok(())
}
