//! Structured Data Validator - command line entry point.
//!
//! Usage:
//!   sd-validator --config validator.toml parse page.html
//!   sd-validator --config validator.toml validate page.html --fail-on-findings
//!   curl -s https://shop.example/ | sd-validator --config validator.toml validate -

use clap::{Parser, Subcommand};
use sd_validator::{EmbeddedDataParser, ValidationOrchestrator, ValidatorConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sd-validator")]
#[command(about = "Validate RDFa and Microdata embedded in HTML against SPARQL rules")]
struct Args {
    /// Validator configuration (TOML)
    #[arg(short, long, default_value = "validator.toml")]
    config: PathBuf,

    /// Fail on malformed embedded data instead of skipping it
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the statements extracted from an HTML document as N-Triples
    Parse {
        /// HTML file, or - for stdin
        input: String,
    },
    /// Validate the statements of an HTML document and print the JSON report
    Validate {
        /// HTML file, or - for stdin
        input: String,

        /// Exit with status 1 when any rule produced findings
        #[arg(long)]
        fail_on_findings: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = ValidatorConfig::from_file(&args.config)?;
    let strict = args.strict || config.strict;

    match args.command {
        Command::Parse { input } => {
            let parser = EmbeddedDataParser::new(strict).with_base(&config.base_uri)?;
            let triples = parser.parse(&read_input(&input)?)?;
            print!("{}", triples.to_ntriples());
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { input, fail_on_findings } => {
            let html = read_input(&input)?;
            let validator = ValidationOrchestrator::from_config(config.with_strict(strict))?;
            let triples = validator.parse(&html)?;
            let report = validator.validate(&triples)?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if fail_on_findings && !report.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_input(input: &str) -> std::io::Result<String> {
    if input == "-" {
        let mut html = String::new();
        std::io::stdin().read_to_string(&mut html)?;
        return Ok(html);
    }
    std::fs::read_to_string(Path::new(input))
}
