//! ORM Artifacts CLI
//!
//! Command-line interface for flattening schemas and deriving model artifacts.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use orm_artifacts::{
    extract_schemas, generate, load_document_auto, resolve_deep, resolve_named, ArtifactsConfig,
    Schemas,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orm-artifacts")]
#[command(about = "Derive ORM model artifacts from OpenAPI schemas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a named schema's $ref and allOf composition
    Resolve {
        /// Document source: file path or URL (http:// or https://)
        source: String,

        /// Schema name under components.schemas
        name: String,

        /// Also flatten nested properties and items
        #[arg(long)]
        deep: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Derive artifacts for every model (schemas with x-tablename)
    Artifacts {
        /// Document source: file path or URL (http:// or https://)
        source: String,

        /// Only print this model
        #[arg(long)]
        model: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Drop default values that cannot be mapped instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve {
            source,
            name,
            deep,
            pretty,
            output,
        } => run_resolve(&source, &name, deep, pretty, output),

        Commands::Artifacts {
            source,
            model,
            pretty,
            lenient,
            output,
            config,
        } => run_artifacts(ArtifactsArgs {
            source,
            model,
            pretty,
            lenient,
            output,
            config,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_schemas(source: &str) -> Result<Schemas, u8> {
    load_document_auto(source)
        .and_then(extract_schemas)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })
}

fn run_resolve(
    source: &str,
    name: &str,
    deep: bool,
    pretty: bool,
    output: Option<PathBuf>,
) -> Result<(), u8> {
    let schemas = load_schemas(source)?;

    let resolved = if deep {
        schemas
            .get(name)
            .ok_or_else(|| orm_artifacts::ResolveError::SchemaNotFound {
                name: name.to_string(),
                referenced_by: None,
            })
            .and_then(|schema| resolve_deep(schema, &schemas))
    } else {
        resolve_named(name, &schemas)
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&resolved, pretty, output)
}

struct ArtifactsArgs {
    source: String,
    model: Option<String>,
    pretty: bool,
    lenient: bool,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn run_artifacts(args: ArtifactsArgs) -> Result<(), u8> {
    let ArtifactsArgs {
        source,
        model,
        pretty,
        lenient,
        output,
        config,
    } = args;

    let config = ArtifactsConfig::load_from(config.as_deref()).map_err(|e| {
        eprintln!("Error loading config: {}", e);
        2u8
    })?;
    let mut options = config.generate_options();
    if lenient {
        options = options.strict_defaults(false);
    }
    let pretty = pretty || config.output.pretty;

    let schemas = load_schemas(&source)?;
    let mut models = generate(&schemas, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match model {
        Some(name) => {
            let artifacts = models.remove(&name).ok_or_else(|| {
                eprintln!("Error: '{}' is not a model", name);
                2u8
            })?;
            write_output(&artifacts, pretty, output)
        }
        None => write_output(&models, pretty, output),
    }
}

fn write_output<T: Serialize>(value: &T, pretty: bool, output: Option<PathBuf>) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
