//! SWE Common inspection tool.
//!
//! Loads a schema (a bare component or a DataStream, in XML or JSON),
//! reports its layout, rewrites it in the other schema format, and
//! transcodes data between the four encodings.

mod commands;
mod config;
mod schema_file;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "swe-inspect")]
#[command(about = "Inspect SWE Common schemas and transcode their data")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Codec configuration file (YAML); environment variables are used otherwise
    #[arg(short, long, global = true, env = "SWE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the component tree, atom layout and encoding of a schema
    Describe {
        /// Schema file (XML or JSON)
        schema: PathBuf,
    },

    /// Rewrite a schema in XML or JSON form
    Export {
        /// Schema file (XML or JSON)
        schema: PathBuf,

        /// Output schema format
        #[arg(long, value_enum)]
        to: SchemaFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode data with the schema's encoding and write it in another one
    Convert {
        /// Schema file (XML or JSON)
        schema: PathBuf,

        /// Encoded data; the schema's inline values are used when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Target encoding
        #[arg(long, value_enum)]
        to: TargetEncoding,

        /// Write JSON records as arrays instead of objects
        #[arg(long)]
        records_as_arrays: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SchemaFormat {
    Xml,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TargetEncoding {
    Text,
    Binary,
    Json,
    Xml,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    // stdout carries command output, so logs go to stderr
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let codec_config = config::load(args.config.as_deref())?;
    debug!(config = ?codec_config, "Loaded codec configuration");

    match args.command {
        Command::Describe { schema } => {
            let stream = schema_file::load(&schema)?;
            print!("{}", commands::describe(&stream, &codec_config)?);
        }
        Command::Export { schema, to, output } => {
            let stream = schema_file::load(&schema)?;
            let text = commands::export(&stream, to, codec_config.pretty_json)?;
            commands::emit(output.as_deref(), text.as_bytes())?;
        }
        Command::Convert {
            schema,
            input,
            to,
            records_as_arrays,
            output,
        } => {
            let stream = schema_file::load(&schema)?;
            let data = match input {
                Some(path) => Some(std::fs::read(path)?),
                None => None,
            };
            let target = commands::target_encoding(to, records_as_arrays, &codec_config);
            let bytes = commands::convert(&stream, data.as_deref(), &target, &codec_config)?;
            commands::emit(output.as_deref(), &bytes)?;
        }
    }

    Ok(())
}
