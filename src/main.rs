//! modal-rs - Command-line entry point
//!
//! Records accelerometer sessions and extracts, compares and combines the
//! natural frequencies found in them.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use modal_rs::{
    analysis::{
        analyze_record, combine_rounded, AnalysisRequest, FrequencyAggregator, FrequencyGroup,
        GroupOrder, Observation,
    },
    backend::{IngestBackend, IngestMessage, LineSource, MockPattern, MockSource, ReaderSource},
    config::{self, AppConfig, MagnitudeScale, SpectrumMode},
    files::{self, SpectrumColumn},
    session::{RecorderEvent, RecordingController, SessionRecording},
    types::Axis,
};

/// Accelerometer recorder and modal frequency extractor
#[derive(Parser)]
#[command(name = "modal-rs", version, about)]
struct Cli {
    /// Config file (JSON or TOML); defaults to the data directory
    #[arg(long, global = true, env = "MODAL_RS_CONFIG")]
    config: Option<PathBuf>,

    /// Also write logs to daily-rolling files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect natural frequencies in sample CSV files
    Analyze(AnalyzeArgs),
    /// Find frequencies that recur across natural-frequency files
    Compare(CompareArgs),
    /// Merge natural-frequency files into one list
    Combine(CombineArgs),
    /// Record from a serial device, stdin or the mock source
    Record(RecordArgs),
    /// Show or write the configuration
    Config(ConfigArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Fft,
    Psd,
}

impl From<ModeArg> for SpectrumMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fft => SpectrumMode::Fft,
            ModeArg::Psd => SpectrumMode::Psd,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Spread,
    Frequency,
}

impl From<SortArg> for GroupOrder {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Spread => GroupOrder::SpreadDescending,
            SortArg::Frequency => GroupOrder::FrequencyAscending,
        }
    }
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Sample CSV files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Only analyse this sensor
    #[arg(long)]
    sensor: Option<u32>,

    /// Only analyse this axis (X, Y or Z)
    #[arg(long)]
    axis: Option<Axis>,

    /// Spectrum estimator
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Zero-padding factor
    #[arg(long)]
    padding: Option<usize>,

    /// Peak height threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Detect peaks on raw instead of normalized magnitudes
    #[arg(long)]
    raw: bool,

    /// Ignore samples before this time (raw time units)
    #[arg(long)]
    start_us: Option<f64>,

    /// Ignore samples after this time (raw time units)
    #[arg(long)]
    end_us: Option<f64>,

    /// Also write one spectrum CSV per sensor and axis
    #[arg(long)]
    spectra: bool,

    /// Write spectrum CSVs in dB (implies --spectra)
    #[arg(long)]
    db: bool,

    /// Output directory (default: next to each input)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct CompareArgs {
    /// Natural-frequency CSV files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Grouping tolerance (Hz)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Result ordering
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// Output file
    #[arg(long, default_value = "comparison_modes.csv")]
    out: PathBuf,
}

#[derive(Args)]
struct CombineArgs {
    /// Natural-frequency CSV files
    files: Vec<PathBuf>,

    /// Also include every natural-frequency CSV in this folder
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Grouping tolerance (Hz)
    #[arg(long, conflicts_with = "exact")]
    tolerance: Option<f64>,

    /// Deduplicate by rounding to 3 decimals instead of tolerance grouping
    #[arg(long)]
    exact: bool,

    /// Output file
    #[arg(long, default_value = "combined_natural_frequencies.csv")]
    out: PathBuf,
}

#[derive(Args)]
struct RecordArgs {
    /// Serial device or file to read; "-" for stdin
    #[arg(long, conflicts_with = "mock")]
    input: Option<PathBuf>,

    /// Use the built-in signal generator
    #[arg(long)]
    mock: bool,

    /// Wait for an impact instead of recording immediately
    #[arg(long)]
    auto: bool,

    /// Stop after this many seconds
    #[arg(long)]
    seconds: Option<f64>,

    /// Directory for recordings (default: the Cached_Samples data directory)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Write the default configuration to the config path
    #[arg(long)]
    write_default: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;

    let config = AppConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Command::Analyze(args) => run_analyze(args, &config),
        Command::Compare(args) => run_compare(args, &config),
        Command::Combine(args) => run_combine(args, &config),
        Command::Record(args) => run_record(args, config),
        Command::Config(args) => run_config(args, cli.config.as_deref(), &config),
    }
}

/// Initialize logging to stderr, plus a file layer when `log_dir` is given
fn init_tracing(
    log_dir: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            config::ensure_dir(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "modal-rs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,modal_rs=debug")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run_analyze(args: AnalyzeArgs, config: &AppConfig) -> anyhow::Result<()> {
    let mut settings = config.analysis.clone();
    if let Some(mode) = args.mode {
        settings.mode = mode.into();
    }
    if let Some(padding) = args.padding {
        if !(1..=config::MAX_PADDING_FACTOR).contains(&padding) {
            bail!("--padding must be between 1 and {}", config::MAX_PADDING_FACTOR);
        }
        settings.padding_factor = padding;
    }
    if let Some(threshold) = args.threshold {
        settings.detection_tolerance = threshold;
    }
    if args.raw {
        settings.magnitude_scale = MagnitudeScale::Raw;
    }

    let mut request = AnalysisRequest::default().with_time_range(args.start_us, args.end_us);
    if let Some(sensor) = args.sensor {
        request = request.with_sensor(sensor);
    }
    if let Some(axis) = args.axis {
        request = request.with_axes(&[axis]);
    }

    let mut analysed = 0usize;
    let mut failed_exports = 0usize;
    for path in &args.files {
        let record = match files::read_samples_csv(path) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        let report = analyze_record(&record, &request, &settings);
        println!("{}", path.display());
        for result in &report.results {
            let freqs: Vec<String> = result
                .peaks
                .iter()
                .map(|p| format!("{:.2}", p.frequency))
                .collect();
            println!(
                "  sensor {} axis {} ({}): {}",
                result.sensor_id,
                result.axis,
                settings.mode.display_name(),
                if freqs.is_empty() {
                    "no peaks".to_string()
                } else {
                    freqs.join(", ")
                }
            );
        }
        for skipped in &report.skipped {
            println!(
                "  sensor {} axis {}: skipped ({})",
                skipped.sensor_id, skipped.axis, skipped.error
            );
        }
        let unique: Vec<String> = report
            .unique_frequencies(2)
            .iter()
            .map(|f| format!("{:.2}", f))
            .collect();
        println!("  distinct: {}", unique.join(", "));

        let spectra = if args.db {
            Some(SpectrumColumn::Decibels)
        } else if args.spectra {
            Some(SpectrumColumn::Raw)
        } else {
            None
        };
        let export = files::export_report(path, &report, args.out_dir.as_deref(), spectra);
        failed_exports += export.failed.len();
        analysed += 1;
    }

    if analysed == 0 {
        bail!("No input file could be analysed");
    }
    if failed_exports > 0 {
        bail!("{} result file(s) could not be written", failed_exports);
    }
    Ok(())
}

/// Observations from every readable file, skipping the rest with a warning
fn load_observations(paths: &[PathBuf]) -> Vec<Observation> {
    let mut observations = Vec::new();
    for path in paths {
        match files::read_natural_frequencies(path) {
            Ok(obs) => observations.extend(obs),
            Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
        }
    }
    observations
}

/// Print groups in their display order, labelled with the mode numbers the
/// exported file uses
fn print_groups(groups: &[FrequencyGroup]) {
    println!(
        "{:>4}  {:>12}  {:>10}  {:>8}  {:<12}  {}",
        "Mode", "Freq (Hz)", "Spread %", "Sources", "Sensors", "Axes"
    );
    for (g, number) in groups.iter().zip(files::export_mode_numbers(groups)) {
        let sensors: Vec<&str> = g.sensor_ids.iter().map(String::as_str).collect();
        let axes: Vec<&str> = g.axes.iter().map(|a| a.label()).collect();
        println!(
            "{:>4}  {:>12.4}  {:>10.4}  {:>8}  {:<12}  {}",
            number,
            g.mean(),
            g.spread_percent(),
            g.sources.len(),
            sensors.join(","),
            axes.join(",")
        );
    }
}

fn run_compare(args: CompareArgs, config: &AppConfig) -> anyhow::Result<()> {
    let mut settings = config.aggregation.clone();
    if let Some(tolerance) = args.tolerance {
        settings = settings.with_tolerance(tolerance)?;
    }
    if let Some(sort) = args.sort {
        settings.order = sort.into();
    }

    let observations = load_observations(&args.files);
    if observations.is_empty() {
        bail!("No natural frequencies found in the given files");
    }

    let groups = FrequencyAggregator::new(settings).compare(&observations);
    print_groups(&groups);
    files::write_modes_csv(&args.out, &groups)?;
    Ok(())
}

fn run_combine(args: CombineArgs, config: &AppConfig) -> anyhow::Result<()> {
    let mut paths = args.files.clone();
    if let Some(dir) = &args.dir {
        let found = files::find_natural_frequency_files(dir)?;
        if found.is_empty() {
            tracing::warn!("No natural_frequencies files in {:?}", dir);
        }
        paths.extend(found);
    }
    if paths.is_empty() {
        bail!("Give natural-frequency files or --dir");
    }

    let observations = load_observations(&paths);
    let combined = if args.exact {
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
        combine_rounded(&values, 3)
    } else {
        let mut settings = config.aggregation.clone();
        if let Some(tolerance) = args.tolerance {
            settings = settings.with_tolerance(tolerance)?;
        }
        let groups = FrequencyAggregator::new(settings).combine(&observations);
        print_groups(&groups);
        groups.iter().map(FrequencyGroup::mean).collect()
    };

    println!("{} combined frequencies from {} file(s)", combined.len(), paths.len());
    files::write_combined_csv(&args.out, &combined)?;
    Ok(())
}

/// Mock recording length when no duration is given
const DEFAULT_MOCK_SECONDS: f64 = 10.0;

fn run_record(args: RecordArgs, config: AppConfig) -> anyhow::Result<()> {
    let source: Box<dyn LineSource> = if args.mock {
        let pattern = if args.auto {
            MockPattern::Impacts {
                frequency: 32.0,
                amplitude: 4.0,
                decay_s: 0.8,
                period_s: 20.0,
            }
        } else {
            MockPattern::Tones(vec![(12.5, 0.4), (47.0, 0.2), (118.0, 0.1)])
        };
        Box::new(
            MockSource::new(1000.0)
                .with_sensors(&[1, 2])
                .with_pattern(pattern)
                .realtime(true),
        )
    } else {
        match args.input.as_deref() {
            None => bail!("Give --input PATH (or - for stdin) or --mock"),
            Some(p) if p == Path::new("-") => Box::new(ReaderSource::stdin()),
            Some(p) => Box::new(
                ReaderSource::open(p).with_context(|| format!("Opening {:?}", p))?,
            ),
        }
    };

    let seconds = args
        .seconds
        .or(if args.mock { Some(DEFAULT_MOCK_SECONDS) } else { None });
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));

    let out_dir = args.out_dir.clone().unwrap_or_else(|| config.samples_dir());
    config::ensure_dir(&out_dir)?;

    let (controller, events) = RecordingController::with_system_clock(config.recording.clone());
    let (analysis_tx, analysis_rx) = crossbeam_channel::unbounded::<SessionRecording>();
    let analysis_thread = spawn_analysis_worker(analysis_rx, config.clone(), out_dir);

    let (backend, handle) = IngestBackend::new(source);
    let ingest_thread = backend.spawn()?;

    if args.auto {
        controller.arm();
    } else {
        controller.start();
    }

    let forward = |events: &Receiver<RecorderEvent>| {
        for event in events.try_iter() {
            match event {
                RecorderEvent::Stopped { recording } => {
                    if analysis_tx.send(recording).is_err() {
                        tracing::error!("Analysis worker is gone; recording dropped");
                    }
                }
                RecorderEvent::ImpactDetected { magnitude } => {
                    println!("Impact detected ({:.2})", magnitude)
                }
                RecorderEvent::Started { trigger } => println!("Recording ({:?})", trigger),
                RecorderEvent::Armed => println!("Armed, waiting for impact"),
                RecorderEvent::Disarmed => {}
            }
        }
    };

    let mut malformed = 0u64;
    loop {
        match handle.recv_timeout(Duration::from_millis(50)) {
            Ok(Some(IngestMessage::Sample(sample))) => controller.push_sample(sample),
            Ok(Some(IngestMessage::Malformed { .. })) => malformed += 1,
            Ok(Some(IngestMessage::SourceError(e))) => tracing::error!("Source error: {}", e),
            Ok(Some(IngestMessage::EndOfStream(_))) | Err(()) => break,
            Ok(None) => {}
        }
        controller.tick();
        forward(&events);

        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("Recording time elapsed");
            break;
        }
    }

    handle.stop();
    if args.auto {
        controller.disarm();
    }
    controller.stop();
    forward(&events);
    drop(analysis_tx);

    if ingest_thread.join().is_err() {
        tracing::error!("Ingestion thread panicked");
    }
    if analysis_thread.join().is_err() {
        bail!("Analysis thread panicked");
    }
    if malformed > 0 {
        println!("{} malformed line(s) dropped", malformed);
    }
    Ok(())
}

/// Export and analyse finished recordings off the ingestion path
fn spawn_analysis_worker(
    recordings: Receiver<SessionRecording>,
    config: AppConfig,
    out_dir: PathBuf,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for recording in recordings {
            if recording.is_empty() {
                tracing::warn!("Recording {} is empty, not exported", recording.metadata.name);
                continue;
            }

            let csv_path = out_dir.join(recording.file_name());
            if let Err(e) = files::write_samples_csv(&csv_path, &recording.record) {
                tracing::error!("{}", e);
                continue;
            }
            if let Err(e) = recording.save_metadata(&csv_path.with_extension("json")) {
                tracing::warn!("{}", e);
            }

            let report = analyze_record(
                &recording.record,
                &AnalysisRequest::default(),
                &config.analysis,
            );
            let nf_path = files::natural_frequencies_path(&csv_path, None);
            match files::write_natural_frequencies_csv(&nf_path, &report) {
                Ok(()) => println!(
                    "Saved {} ({} samples, {} peaks)",
                    csv_path.display(),
                    recording.sample_count(),
                    report.peak_count()
                ),
                Err(e) => tracing::error!("{}", e),
            }
        }
    })
}

fn run_config(args: ConfigArgs, path: Option<&Path>, config: &AppConfig) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::default_config_path().context("No data directory on this platform")?,
    };

    if args.write_default {
        AppConfig::default().save(&path)?;
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("# {}", path.display());
        println!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
