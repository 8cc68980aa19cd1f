use std::ffi::OsString;
use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

use sra_read_locator::app::{App, LocateRequest};
use sra_read_locator::config::ConfigLoader;
use sra_read_locator::error::ReadsError;
use sra_read_locator::eutils::{EutilsHttpClient, EutilsUrls};
use sra_read_locator::output::{JsonOutput, OutputMode, TextOutput};
use sra_read_locator::pipeline::Resolver;

#[derive(Parser)]
#[command(name = "sra-reads")]
#[command(about = "Find the sequencing runs to download for NCBI BioProjects")]
#[command(version)]
struct Cli {
    /// File of accessions, one per line
    #[arg(long)]
    accession_list: Option<Utf8PathBuf>,

    /// NCBI BioProject accessions
    #[arg(long, num_args = 1..)]
    bioprojects: Vec<String>,

    /// GenomeTrackr species (not yet supported)
    #[arg(long)]
    genome_trackr: Option<String>,

    #[arg(long, default_value = "download_reads.log")]
    logfile: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    /// Maximum UIDs per E-utilities request
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    json: bool,

    /// Write the JSON report to this path
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ReadsError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ReadsError) -> u8 {
    match error {
        ReadsError::ConfigRead(_) | ReadsError::ConfigParse(_) | ReadsError::InvalidBatchSize(_) => {
            2
        }
        ReadsError::UpstreamQuery(_) | ReadsError::UpstreamStatus { .. } => 3,
        ReadsError::MalformedRecord { .. } | ReadsError::UnresolvedJoin { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    tracing::info!("program started");
    tracing::info!("command line: {}", command_line(std::env::args_os()));

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let batch_size = cli.batch_size.or(config.batch_size);
    let client = EutilsHttpClient::new(config.timeout)?;
    let resolver = Resolver::new(client, EutilsUrls::new(config.eutils_base_url.clone()))
        .with_batch_size(batch_size)?;
    let app = App::new(resolver);

    let request = LocateRequest {
        accession_list: cli.accession_list,
        bioprojects: config.bioprojects_with(&cli.bioprojects),
        genome_trackr: cli.genome_trackr,
    };
    let result = app.locate(&request)?;

    if let Some(path) = &cli.output {
        JsonOutput::write_report(path, &result)?;
        tracing::info!(%path, "wrote report");
    }

    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    match mode {
        OutputMode::Json => JsonOutput::print_locate(&result).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_locate(&result).into_diagnostic()?,
    }

    tracing::info!(runs = result.runs.len(), "program finished");
    Ok(())
}

/// Arguments that are not valid UTF-8 are logged lossily.
fn command_line(args: impl IntoIterator<Item = OsString>) -> String {
    args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn init_logging(cli: &Cli) -> miette::Result<()> {
    let file = File::create(cli.logfile.as_std_path()).into_diagnostic()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sra_read_locator=debug,sra_reads=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_timer(ChronoLocal::new("%m/%d/%Y %H:%M:%S".to_string()))
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
