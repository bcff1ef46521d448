//! collector-plugins CLI - run document-transform pipelines from configuration
//!
//! Reads a JSON array of documents, applies the configured plugins in order and
//! writes the resulting documents as JSON.

use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use collector_plugins::document::{documents_from_json, documents_to_json};
use collector_plugins::{PipelineConfig, PluginLoader};

#[derive(Parser)]
#[command(name = "collector-plugins")]
#[command(version, about = "Composable document-transform plugins for collection pipelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over a JSON array of documents
    Run {
        /// Path to pipeline configuration (YAML or JSON)
        #[arg(short, long, env = "COLLECTOR_PIPELINE", default_value = "pipeline.yaml")]
        config: PathBuf,

        /// Input documents; "-" reads stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file; "-" writes stdout
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Pretty-print the output JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Load plugin specifications and report what each evaluates to
    Check {
        /// Plugin specifications, e.g. 'ComputeRank("rank")'
        #[arg(required = true)]
        specs: Vec<String>,

        /// Code table replacing the built-in department table
        #[arg(long)]
        code_table: Option<PathBuf>,
    },

    /// List the names exported by the default plugin module
    List,
}

fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, input, output, pretty } => run_pipeline(config, input, output, pretty),
        Commands::Check { specs, code_table } => check_specs(specs, code_table),
        Commands::List => list_plugins(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Run the configured pipeline over the input documents
fn run_pipeline(config: PathBuf, input: PathBuf, output: PathBuf, pretty: bool) -> Result<(), String> {
    let config = PipelineConfig::load_from_file(&config).map_err(|e| e.to_string())?;
    let pipeline = config.build().map_err(|e| e.to_string())?;
    tracing::info!("Loaded {} plugins", pipeline.len());

    let mut raw = String::new();
    if is_stdio(&input) {
        std::io::stdin()
            .read_to_string(&mut raw)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
    } else {
        raw = std::fs::read_to_string(&input)
            .map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;
    }

    let documents = documents_from_json(&raw).map_err(|e| e.to_string())?;
    let documents = pipeline.run(documents).map_err(|e| e.to_string())?;
    let rendered = documents_to_json(&documents, pretty).map_err(|e| e.to_string())?;

    if is_stdio(&output) {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", rendered).map_err(|e| format!("Failed to write stdout: {}", e))?;
    } else {
        std::fs::write(&output, rendered + "\n")
            .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
        eprintln!("  ✓ Wrote {} documents to {}", documents.len(), output.display());
    }

    Ok(())
}

/// Evaluate each specification, stopping at the first failure
fn check_specs(specs: Vec<String>, code_table: Option<PathBuf>) -> Result<(), String> {
    let config = PipelineConfig {
        plugins: Vec::new(),
        code_table,
    };
    let loader = config.loader().map_err(|e| e.to_string())?;

    for spec in &specs {
        let value = loader
            .load_plugin(spec)
            .map_err(|e| format!("{}: {}", spec, e))?;
        println!("  ✓ {} => {}", spec, value);
    }

    Ok(())
}

fn list_plugins() -> Result<(), String> {
    let loader = PluginLoader::new();
    let module = loader.default_module();

    println!("{}:", module.module());
    for name in module.names() {
        println!("  {}", name);
    }

    Ok(())
}
