use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_geo_alchemy::app::{
    App, MappingSource, PreprocessOptions, ProgressEvent, ProgressSink, SeriesSource,
};
use kira_geo_alchemy::config::{ConfigLoader, ResolvedConfig};
use kira_geo_alchemy::domain::{AggregateFunction, PlatformAccession, SeriesAccession};
use kira_geo_alchemy::error::{ErrorKind, KiraError};
use kira_geo_alchemy::geo::GeoHttpClient;
use kira_geo_alchemy::output::JsonOutput;
use kira_geo_alchemy::store::Store;

#[derive(Parser)]
#[command(name = "kira-geo")]
#[command(about = "Turn GEO series into analysis-ready clinical and gene expression tables")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Path to a kira-geo.json configuration file")]
    config: Option<String>,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true, help = "Write logs to this file instead of stderr")]
    log_file: Option<PathBuf>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Series preprocessing: write clinical and gene expression files")]
    Pp(PpArgs),
    #[command(about = "Fetch series metadata and save it as JSON lines")]
    Metadata(MetadataArgs),
    #[command(about = "Write the probe to gene mapping of a platform")]
    Platform(PlatformArgs),
}

#[derive(Args)]
struct PpArgs {
    #[arg(short, long, required_unless_present = "series_file", conflicts_with = "series_file")]
    series: Option<String>,

    #[arg(long = "series-file")]
    series_file: Option<PathBuf>,

    #[arg(short, long)]
    platform: Option<String>,

    #[arg(
        short,
        long,
        required_unless_present = "mapping_file",
        help = "1-based column of the platform annotation holding the gene"
    )]
    gene: Option<usize>,

    #[arg(short, long = "mapping-file")]
    mapping_file: Option<PathBuf>,

    #[arg(short, long)]
    aggregate: Option<AggregateFunction>,

    #[arg(short, long, default_value = "{accession}_clinical.txt")]
    clinical: String,

    #[arg(short, long, default_value = "{accession}_expression.txt")]
    expression: String,

    #[arg(long)]
    cache_dir: Option<String>,
}

#[derive(Args)]
struct MetadataArgs {
    #[arg(short, long)]
    series: String,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PlatformArgs {
    #[arg(short, long)]
    platform: String,

    #[arg(short, long)]
    gene: usize,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    cache_dir: Option<String>,
}

struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>6.1}s] {}", elapsed.as_secs_f64(), event.message),
            None => eprintln!("          {}", event.message),
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error.kind() {
        ErrorKind::Routing | ErrorKind::Usage => 2,
        ErrorKind::Download => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let logger = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match &cli.log_file {
        Some(path) => {
            let file = File::create(path).map_err(|err| {
                KiraError::Filesystem(format!("create log file {}: {err}", path.display()))
            })?;
            logger.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => logger.with_writer(std::io::stderr).init(),
    }

    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Pp(args) => run_pp(args, &config, cli.json),
        Commands::Metadata(args) => run_metadata(args, &config, cli.json),
        Commands::Platform(args) => run_platform(args, &config, cli.json),
    }
}

fn build_app(config: &ResolvedConfig, cache_dir: Option<&str>) -> miette::Result<App<GeoHttpClient>> {
    let cache_root = cache_dir
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| config.cache_dir.clone());
    let store = Store::new_with_root(cache_root);
    store.ensure_cache_root()?;
    let client = GeoHttpClient::with_settings(
        config.retries,
        Duration::from_secs(config.timeout_seconds),
    )?;
    Ok(App::new(store, client, config.max_age_seconds))
}

fn run_pp(args: PpArgs, config: &ResolvedConfig, json: bool) -> miette::Result<()> {
    let series = match (args.series, args.series_file) {
        (Some(accession), _) => SeriesSource::Accession(accession.parse::<SeriesAccession>()?),
        (None, Some(path)) => SeriesSource::RecordFile(path),
        (None, None) => {
            return Err(KiraError::InvalidArgument(
                "either --series or --series-file must be provided".to_string(),
            )
            .into());
        }
    };
    let mapping = match (args.mapping_file, args.gene) {
        (Some(path), _) => MappingSource::File(path),
        (None, Some(column)) => MappingSource::GeneColumn(column),
        (None, None) => {
            return Err(KiraError::InvalidArgument(
                "--gene must be provided when no mapping file is given".to_string(),
            )
            .into());
        }
    };
    let platform = args
        .platform
        .map(|value| value.parse::<PlatformAccession>())
        .transpose()?;

    let mut options = PreprocessOptions::new(series, mapping);
    options.platform = platform;
    options.aggregate = args.aggregate.unwrap_or(config.aggregate);
    options.clinical_file = args.clinical;
    options.expression_file = args.expression;

    let mut app = build_app(config, args.cache_dir.as_deref())?;
    if json {
        let result = app.preprocess(options, &JsonOutput)?;
        JsonOutput::print_preprocess(&result).into_diagnostic()?;
    } else {
        let result = app.preprocess(options, &StderrProgress)?;
        println!("Series {} on platform {}", result.accession, result.platform_accession);
        println!(
            "  probes: {}  samples: {}  genes: {}",
            result.probe_count, result.sample_count, result.gene_count
        );
        println!("Clinical file saved to {}.", result.clinical_path);
        println!("Expression file saved to {}.", result.expression_path);
    }
    Ok(())
}

fn run_metadata(args: MetadataArgs, config: &ResolvedConfig, json: bool) -> miette::Result<()> {
    let accession: SeriesAccession = args.series.parse()?;
    let mut app = build_app(config, None)?;
    if json {
        let result = app.metadata(&accession, args.output.as_deref(), &JsonOutput)?;
        JsonOutput::print_metadata(&result).into_diagnostic()?;
    } else {
        let result = app.metadata(&accession, args.output.as_deref(), &StderrProgress)?;
        println!(
            "Series {} ({} samples, platforms: {})",
            result.accession,
            result.sample_count,
            result.platforms.join(", ")
        );
        println!("Record saved to {}.", result.output_path);
    }
    Ok(())
}

fn run_platform(args: PlatformArgs, config: &ResolvedConfig, json: bool) -> miette::Result<()> {
    let accession: PlatformAccession = args.platform.parse()?;
    let mut app = build_app(config, args.cache_dir.as_deref())?;
    if json {
        let result =
            app.platform_mapping(&accession, args.gene, args.output.as_deref(), &JsonOutput)?;
        JsonOutput::print_mapping(&result).into_diagnostic()?;
    } else {
        let result =
            app.platform_mapping(&accession, args.gene, args.output.as_deref(), &StderrProgress)?;
        println!(
            "{} probes mapped to column {} of {}",
            result.probe_count, result.gene_column, result.platform_accession
        );
        println!("Mapping saved to {}.", result.output_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pp_requires_a_series_source() {
        assert!(Cli::try_parse_from(["kira-geo", "pp", "-g", "11"]).is_err());
        assert!(Cli::try_parse_from(["kira-geo", "pp", "-s", "GSE73091", "-g", "11"]).is_ok());
    }

    #[test]
    fn log_file_is_a_global_option() {
        let cli = Cli::try_parse_from([
            "kira-geo",
            "pp",
            "-s",
            "GSE73091",
            "-g",
            "11",
            "--log-file",
            "pp.log",
        ])
        .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("pp.log")));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let routing = "GPL570".parse::<SeriesAccession>().unwrap_err();
        assert_eq!(map_exit_code(&routing), 2);
        assert_eq!(map_exit_code(&KiraError::GeoHttp("timeout".to_string())), 3);
        assert_eq!(map_exit_code(&KiraError::Xml("bad".to_string())), 1);
    }
}
