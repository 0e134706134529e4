use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use stowage_upload::{
    AssetDescriptor, AssetUploader, Blob, ChunkPlan, ContentHash, EncodingType, HeaderField,
    InMemoryStore, ProposalId, UploadConfig, UploadState,
};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let file = Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("File to upload");

    let tuning = [
        Arg::new("chunk-size")
            .long("chunk-size")
            .value_parser(value_parser!(usize))
            .help("Chunk size in bytes (overrides config file)"),
        Arg::new("concurrency")
            .long("concurrency")
            .value_parser(value_parser!(usize))
            .help("Maximum concurrent chunk uploads (overrides config file)"),
    ];

    Command::new("stowage")
        .version(stowage_upload::VERSION)
        .about("Chunked asset uploads with bounded concurrency and atomic commit")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with upload settings"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs and reports as JSON"),
        )
        .subcommand(
            Command::new("plan")
                .about("Show how a file would be split into chunks")
                .arg(file.clone())
                .args(tuning.clone()),
        )
        .subcommand(
            Command::new("simulate")
                .about("Upload a file into an in-memory store and report the result")
                .arg(file)
                .args(tuning)
                .arg(
                    Arg::new("collection")
                        .long("collection")
                        .default_value("assets")
                        .help("Target collection"),
                )
                .arg(
                    Arg::new("full-path")
                        .long("full-path")
                        .help("Destination path (default: /{collection}/{file name})"),
                )
                .arg(
                    Arg::new("mime-type")
                        .long("mime-type")
                        .help("MIME type, used to infer Content-Type"),
                )
                .arg(
                    Arg::new("header")
                        .long("header")
                        .action(ArgAction::Append)
                        .help("Extra header as 'Name: value' (repeatable)"),
                )
                .arg(
                    Arg::new("encoding")
                        .long("encoding")
                        .value_parser(value_parser!(EncodingType))
                        .help("Content encoding: identity, gzip, compress, deflate, br"),
                )
                .arg(
                    Arg::new("description")
                        .long("description")
                        .help("Free-form asset description"),
                )
                .arg(
                    Arg::new("token")
                        .long("token")
                        .help("Access token recorded with the asset"),
                )
                .arg(
                    Arg::new("proposal")
                        .long("proposal")
                        .value_parser(value_parser!(u64))
                        .help("Stage under this proposal id, then activate it"),
                )
                .arg(
                    Arg::new("expect-hash")
                        .long("expect-hash")
                        .value_parser(value_parser!(ContentHash))
                        .help("Fail unless the stored asset has this Blake3 hash (hex)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Config file first, then flags
fn resolve_config(args: &ArgMatches) -> Result<UploadConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => UploadConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => UploadConfig::default(),
    };

    if let Some(chunk_size) = args.get_one::<usize>("chunk-size") {
        config = config.with_chunk_size(*chunk_size);
    }
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        config = config.with_max_concurrent_uploads(*concurrency);
    }

    config.validate()?;
    Ok(config)
}

fn parse_header(raw: &str) -> Result<HeaderField> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header '{raw}' is not in 'Name: value' form");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header '{raw}' has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn verify_hash(actual: ContentHash, expected: Option<&ContentHash>) -> Result<()> {
    match expected {
        Some(expected) if *expected != actual => {
            bail!("stored hash {actual} does not match expected {expected}")
        }
        _ => Ok(()),
    }
}

fn required_path(args: &ArgMatches) -> Result<&PathBuf> {
    args.get_one::<PathBuf>("file")
        .context("missing file argument")
}

async fn plan(args: &ArgMatches, json: bool) -> Result<()> {
    let config = resolve_config(args)?;
    let path = required_path(args)?;
    let len = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    let len = usize::try_from(len).context("file too large for this platform")?;

    let chunk_size = config.chunk_size()?;
    let plan = ChunkPlan::new(len, chunk_size);
    let windows = plan.chunk_count().div_ceil(config.concurrency()?.get());

    if json {
        let chunks: Vec<_> = plan
            .ranges()
            .map(|(order_id, range)| {
                serde_json::json!({ "order_id": order_id, "start": range.start, "end": range.end })
            })
            .collect();
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "bytes": len,
            "chunk_size": chunk_size.get(),
            "max_concurrent_uploads": config.max_concurrent_uploads,
            "chunk_count": plan.chunk_count(),
            "windows": windows,
            "chunks": chunks,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    println!("Bytes: {len}");
    println!("Chunk size: {chunk_size}");
    println!("Chunks: {} in {windows} window(s)", plan.chunk_count());
    for (order_id, range) in plan.ranges() {
        println!("  #{order_id:<5} {:>12} .. {:<12} ({} bytes)", range.start, range.end, range.len());
    }
    Ok(())
}

struct LogObserver;

impl stowage_upload::UploadObserver for LogObserver {
    fn on_transition(&self, state: &UploadState) {
        if let UploadState::Uploading {
            chunks_uploaded,
            chunk_count,
            ..
        } = state
        {
            tracing::info!(chunks_uploaded, chunk_count, "window complete");
        }
    }
}

async fn simulate(args: &ArgMatches, json: bool) -> Result<()> {
    let config = resolve_config(args)?;
    let path = required_path(args)?;

    let mut blob = Blob::from_path(path).await?;
    if let Some(mime_type) = args.get_one::<String>("mime-type") {
        blob = blob.with_mime_type(mime_type.clone());
    }

    let collection = args
        .get_one::<String>("collection")
        .context("missing collection")?;
    let mut descriptor = AssetDescriptor::new(collection.clone(), file_name(path)?, blob);
    if let Some(full_path) = args.get_one::<String>("full-path") {
        descriptor = descriptor.with_full_path(full_path.clone());
    }
    if let Some(raw_headers) = args.get_many::<String>("header") {
        let headers = raw_headers
            .map(String::as_str)
            .map(parse_header)
            .collect::<Result<Vec<_>>>()?;
        descriptor = descriptor.with_headers(headers);
    }
    if let Some(encoding) = args.get_one::<EncodingType>("encoding") {
        descriptor = descriptor.with_encoding(*encoding);
    }
    if let Some(description) = args.get_one::<String>("description") {
        descriptor = descriptor.with_description(description.clone());
    }
    if let Some(token) = args.get_one::<String>("token") {
        descriptor = descriptor.with_token(token.clone());
    }

    let store = InMemoryStore::new();
    let uploader = AssetUploader::new(config).with_observer(std::sync::Arc::new(LogObserver));

    let summary = match args.get_one::<u64>("proposal") {
        Some(id) => {
            let proposal_id = ProposalId(*id);
            let summary = uploader
                .upload_asset_with_proposal(descriptor, proposal_id, &store)
                .await?;
            store.activate_proposal(proposal_id)?;
            summary
        }
        None => uploader.upload_asset(descriptor, &store).await?,
    };

    let stored = store
        .asset(&summary.full_path)
        .context("committed asset is not visible in the store")?;
    verify_hash(stored.hash, args.get_one::<ContentHash>("expect-hash"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    println!("Uploaded {} ({} bytes)", summary.full_path, summary.bytes);
    println!("  Mode: {}", summary.mode);
    println!("  Batch: {}", summary.batch_id);
    println!("  Chunks: {}", summary.chunk_count);
    println!("  Hash: {}", stored.hash);
    for (name, value) in &stored.headers {
        println!("  {name}: {value}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("plan", args)) => {
            let json = args.get_flag("json");
            init_tracing(json);
            plan(args, json).await
        }
        Some(("simulate", args)) => {
            let json = args.get_flag("json");
            init_tracing(json);
            simulate(args, json).await
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
