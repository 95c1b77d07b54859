use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rsql_predicate::{parse_and_compile, CompileConfig, InMemoryStore, QueryError, Schema, Store};
use serde_json::Value;
use slog::{o, Drain, Level, Logger};

/// Compile an RSQL/FIQL filter against a schema, optionally filtering JSON records with it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON schema: type name -> attribute name -> {"type": ..} or {"relation": .., "collection": ..}
    #[arg(short, long)]
    schema: PathBuf,

    /// Entity type the query selects from
    #[arg(short, long)]
    root: String,

    /// JSON array of records to filter; without it the compiled predicate is printed
    #[arg(long)]
    records: Option<PathBuf>,

    /// Treat '*' in ==/!= string values as a LIKE wildcard
    #[arg(long)]
    wildcard_equality: bool,

    /// Compare every string attribute case-insensitively
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Log to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Filter query, e.g. 'name==FOO;age=ge=18'
    query: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast::<QueryError>() {
                Ok(query_error) => eprintln!("{:?}", miette::Report::new(query_error)),
                Err(other) => eprintln!("Error: {:#}", other),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let logger = build_logger(args.verbose);

    let schema_text = fs::read_to_string(&args.schema)
        .with_context(|| format!("reading schema {}", args.schema.display()))?;
    let schema = Schema::from_json(&schema_text)
        .with_context(|| format!("parsing schema {}", args.schema.display()))?;

    let config = CompileConfig::default()
        .with_wildcard_equality(args.wildcard_equality)
        .with_case_insensitive_strings(args.ignore_case);

    let predicate = parse_and_compile(&logger, &args.query, &args.root, &schema, &config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let Some(records_path) = args.records else {
        writeln!(out, "{}", predicate)?;
        return Ok(());
    };

    let records_text = fs::read_to_string(&records_path)
        .with_context(|| format!("reading records {}", records_path.display()))?;
    let records: Vec<Value> = serde_json::from_str(&records_text)
        .with_context(|| format!("records file {} must hold a JSON array", records_path.display()))?;

    let store = InMemoryStore::new(records);
    for record in store.find_all(&logger, &predicate) {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }

    Ok(())
}

fn build_logger(verbose: u8) -> Logger {
    let level = match verbose {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };
    let decorator = slog_term::PlainSyncDecorator::new(io::stderr());
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(level)
        .fuse();
    Logger::root(drain, o!())
}
