//! codeact - command-line entry point.
//!
//! Runs one interaction against a scripted model. Responses come from a
//! script file (responses separated by `---` lines) or from stdin.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use codeact::agent::{AgentController, AgentDependencies, Outcome};
use codeact::config::{self, CodeActConfig, ResearchBackend};
use codeact::logging::{init_logging, LogLevel};
use codeact::model::ScriptedModel;
use codeact::research::{ResearchPort, SimulatedResearch, WebResearch};

#[derive(Parser, Debug)]
#[command(name = "codeact")]
#[command(about = "Turn-based agent loop with code execution and web research")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one interaction and print the outcome
    Run {
        /// The instruction that starts the interaction
        instruction: String,

        /// Configuration file path (defaults to the search paths)
        #[arg(short, long, env = "CODEACT_CONFIG")]
        config: Option<PathBuf>,

        /// Override the turn budget
        #[arg(long)]
        max_turns: Option<u32>,

        /// Never dispatch research actions
        #[arg(long)]
        no_research: bool,

        /// Model responses separated by `---` lines; stdin when omitted
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Interpreter used for `<code>` actions
        #[arg(long)]
        interpreter: Option<String>,

        /// Log at debug level
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the configuration file search paths
    ConfigPaths,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::ConfigPaths => {
            for path in config::search_paths() {
                let marker = if path.exists() { "found" } else { "missing" };
                println!("{} ({marker})", path.display());
            }
            Ok(())
        }
        Command::Run {
            instruction,
            config: config_path,
            max_turns,
            no_research,
            script,
            interpreter,
            verbose,
        } => {
            let file_config = match config_path {
                Some(path) => config::from_path(&path)?,
                None => config::load()?,
            };

            let mut logging = file_config.logging.clone();
            if verbose {
                logging = logging.with_level(LogLevel::Debug);
            }
            let guard = init_logging(&logging)?;

            let mut agent_config = file_config.agent_config()?;
            if let Some(turns) = max_turns {
                agent_config = agent_config.with_max_turns(turns);
            }
            if no_research {
                agent_config = agent_config.with_research(false);
            }

            let script_text = match script {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read script '{}'", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read model responses from stdin")?;
                    buf
                }
            };

            let mut executor = file_config.execution.to_executor();
            if let Some(bin) = interpreter {
                executor = executor.with_interpreter(bin);
            }

            let deps = AgentDependencies::new(
                Arc::new(ScriptedModel::from_script(&script_text)),
                Arc::new(executor),
                research_backend(&file_config, agent_config.max_pages_per_task)?,
            );
            let controller = AgentController::new(deps, agent_config)?;
            let outcome = controller.run_interaction(&instruction).await;

            print_outcome(&outcome);
            let failures = controller.research().get_error_log().await.len();
            if failures > 0 {
                println!("research failures logged: {failures}");
            }
            drop(guard);
            if !outcome.is_completed() {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

fn research_backend(
    config: &CodeActConfig,
    max_pages: u32,
) -> anyhow::Result<Arc<dyn ResearchPort>> {
    let port: Arc<dyn ResearchPort> = match config.research.backend {
        ResearchBackend::Simulated => Arc::new(SimulatedResearch::new().with_max_pages(max_pages)),
        ResearchBackend::Web => Arc::new(WebResearch::with_config(
            config.research.to_web_config(max_pages),
        )?),
    };
    Ok(port)
}

fn print_outcome(outcome: &Outcome) {
    for turn in &outcome.history {
        println!("[{}]\n{}\n", turn.role, turn.content);
    }
    println!("run:    {}", outcome.run_id);
    println!("status: {}", outcome.status);
    println!("turns:  {}", outcome.turns_used);
    if outcome.is_degraded() {
        println!("degraded research calls: {}", outcome.degraded_actions);
    }
    println!("{}", outcome.final_text);
}
