mod conf;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::{command, value_parser, Arg, ArgAction};
use human_bytes::human_bytes;
use logging_timer::time;
use tracing::{error, info, warn};
use twelf::Layer;

use es_row_bridge::debug_if;
use es_row_bridge::models::schema::{RequiredField, SchemaField};
use es_row_bridge::sink::{EsSink, NdjsonTransport};
use es_row_bridge::source::EsSource;
use es_row_bridge::store::MemoryStore;
use es_row_bridge::{Result, Row, Settings};

struct Job {
    settings: Settings,
    schema: Vec<SchemaField>,
    required: Option<Vec<RequiredField>>,
    rows: Vec<Row>,
    output: Option<PathBuf>,
    debug: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .init();

    let matches = command!() // requires `cargo` feature
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Sets a config file (toml or json)")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("Rows to write, one JSON object per line")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write bulk payloads to this NDJSON file instead of a dry run")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug mode")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    info!("Application started!");

    let debug = matches.get_flag("debug");
    let output = matches.get_one::<PathBuf>("output").cloned();
    let (Some(config_path), Some(input_path)) = (
        matches.get_one::<PathBuf>("config").cloned(),
        matches.get_one::<PathBuf>("input").cloned(),
    ) else {
        error!("Both --config and --input must be set!");
        std::process::exit(2);
    };

    let debug_flag = debug;
    info!(
        "Args debug={:?}, config_path={:?}, input={:?}, output={:?}",
        debug_flag, config_path, input_path, output
    );

    let layer = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Layer::Json(config_path.clone()),
        _ => Layer::Toml(config_path.clone()),
    };
    let config = match conf::Config::with_layers(&[layer]) {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to load config file with name {:?}: {}", config_path, err);
            std::process::exit(2);
        }
    };
    debug_if!(debug, "Config file loaded correctly ... {:#?}", config);

    let text = match tokio::fs::read_to_string(&input_path).await {
        Ok(text) => text,
        Err(err) => {
            error!("Failed to read rows from {:?}: {}", input_path, err);
            std::process::exit(2);
        }
    };

    let job = match parse_rows(&text) {
        Ok(rows) => Job {
            settings: config.get_settings(),
            schema: config.get_schema(),
            required: config.get_required(),
            rows,
            output,
            debug,
        },
        Err(err) => {
            error!("Invalid rows in {:?}: {}", input_path, err);
            std::process::exit(2);
        }
    };

    if let Err(err) = run(job) {
        error!("Task aborted: {}", err);
        std::process::exit(1);
    }

    if let Some(usage) = memory_stats::memory_stats() {
        info!(
            "Memory: physical={}, virtual={}",
            human_bytes(usage.physical_mem as f64),
            human_bytes(usage.virtual_mem as f64)
        );
    }
}

fn parse_rows(text: &str) -> Result<Vec<Row>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str::<Row>(line)?))
        .collect()
}

#[time("info")]
fn run(job: Job) -> Result<()> {
    // coordinator side: resolve once, ship to the workers through settings
    let job_settings = EsSink::configure(&job.settings)?;
    let sink = EsSink::new(job_settings.clone()).with_schema(job.schema.clone());

    if let Some(path) = &job.output {
        let transport = NdjsonTransport::new(BufWriter::new(File::create(path)?));
        let mut ctx = sink.prepare(transport)?;
        for row in &job.rows {
            ctx.write(row)?;
        }
        let summary = ctx.cleanup();
        info!(
            "Wrote {} entries ({}) to {:?}",
            summary.entries,
            human_bytes(summary.bytes as f64),
            path
        );
        return Ok(());
    }

    let resource = job_settings.get_resource().unwrap_or("dry-run").to_string();
    let mut store = MemoryStore::new(resource);
    let mut ctx = sink.prepare(&mut store)?;
    for row in &job.rows {
        debug_if!(job.debug, "Writing row {:?}", row);
        ctx.write(row)?;
    }
    let summary = ctx.cleanup();
    info!(
        "Dry run stored {} entries ({}) as {} documents",
        summary.entries,
        human_bytes(summary.bytes as f64),
        store.len()
    );

    let source_settings = EsSource::configure(&job_settings, &job.schema)?;
    let source = EsSource::new(source_settings, job.schema);
    let fields = match &job.required {
        Some(required) => source.project(required)?,
        None => source.target_fields(),
    };
    if fields.is_empty() {
        warn!("No projection configured; reading whole documents back");
    }
    let mut ctx = source.prepare(store.scan(&fields))?;
    while ctx.next()? {
        println!("{}", serde_json::to_string(ctx.row())?);
    }
    let read = ctx.cleanup();
    info!("Read back {} documents with fields {:?}", read, fields);
    Ok(())
}
