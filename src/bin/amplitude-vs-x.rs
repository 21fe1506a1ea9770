//! MPV signal amplitude versus track x position.
//!
//! Every x column of the amplitude-vs-position histograms is fitted with a
//! Landau convolved with a Gaussian; the resulting profiles are saved and
//! drawn on top of the metal strip positions.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use statrs::statistics::Statistics;
use tokio::sync::Mutex;

use lgad_analysis::{
    error::AnalysisError,
    estimator::{EstimatorParams, PeakEstimator, Profile},
    histogram::Hist2D,
    langaus::LanGausFit,
    profiles::{estimate_profile, get_profile},
    render::{save_amplitude_vs_x, save_fit_png, AmplitudePlot, FitPlot},
    stats::BinStatistics,
    store::HistogramStore,
    style::PlotStyle,
    workspace, SensorCatalog,
};

#[cfg(target_family = "unix")]
use tikv_jemallocator::Jemalloc;
#[cfg(target_family = "unix")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Limit x-axis in final plot
    #[clap(short = 'x', long, default_value_t = 2.5)]
    xlength: f64,
    /// Max Amp value in final plot
    #[clap(short = 'y', long, default_value_t = 150.0)]
    ylength: f64,
    /// Dataset, which determines filepath
    #[clap(short = 'D', long, default_value = "")]
    dataset: String,
    /// Run debug mode
    #[clap(short = 'd', long)]
    debug: bool,
    /// Use tight cut for pass
    #[clap(short = 't', long)]
    tight: bool,
    /// Estimator parameters in yaml format
    #[clap(long)]
    config: Option<PathBuf>,
    /// Sensor catalog in json format, used for the plot label
    #[clap(long)]
    catalog: Option<PathBuf>,
    /// Refit even if a cached profile exists
    #[clap(long)]
    no_cache: bool,
}

struct HistoInfo {
    in_name: String,
    out_name: &'static str,
    ylabel: &'static str,
}

impl HistoInfo {
    fn new(in_name: &str, out_name: &'static str, ylabel: &'static str) -> Self {
        Self {
            in_name: in_name.to_owned(),
            out_name,
            ylabel,
        }
    }
}

/// Sequential estimation drawing every fitted bin.
fn estimate_debug(
    th2: &Hist2D,
    info: &HistoInfo,
    params: EstimatorParams,
    position_center: f64,
    outdir_q: &std::path::Path,
    style: &PlotStyle,
) -> Result<Profile, AnalysisError> {
    let estimator = PeakEstimator::new(params, LanGausFit::default());
    estimator.estimate_with(th2, |report| {
        let (Some(hist), Some(fit), Some(window)) = (&report.fitted, &report.fit, report.window) else {
            return;
        };
        let curve = if fit.parameters.len() == LanGausFit::N_PARAMS {
            LanGausFit::curve(&fit.parameters, window.low, window.high, 200)
        } else {
            vec![]
        };
        let title = format!("{} bin {} ({:?})", info.out_name, report.bin, report.outcome);
        let path = outdir_q.join(format!("q_{}{}.png", info.out_name, report.bin));
        if let Err(err) = save_fit_png(&path, &FitPlot { hist, curve: &curve, title: &title }, style) {
            log::warn!("{err}");
        }

        let bin_center = th2.x.bin_center(report.bin) - position_center;
        log::info!(
            "Bin: {} (x center = {bin_center:.3}) -> Amplitude: {:.3} mV",
            report.bin, report.value
        );
    })
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let pb_manager = MultiProgress::new();
    LogWrapper::new(pb_manager.clone(), logger).try_init()?;
    log::set_max_level(level);

    let style = PlotStyle::default();

    let outdir = workspace::get_output_dir(&args.dataset);
    let analysis_file = workspace::get_analysis_file(&outdir, &args.dataset);
    log::info!("Reading {}", analysis_file.to_string_lossy());
    let store = HistogramStore::load(&analysis_file)?;

    let params = args
        .config
        .as_deref()
        .map(EstimatorParams::load)
        .transpose()?
        .unwrap_or_default();
    let catalog = args
        .catalog
        .as_deref()
        .map(SensorCatalog::load)
        .transpose()?
        .unwrap_or_default();

    // Position of the central channel in the x direction
    let position_center = store.central_channel_position()?;
    let plots_dir = workspace::get_plots_dir(&outdir, "Amplitude")?;

    let mut infos = vec![
        HistoInfo::new("amplitude_vs_xy", "Amplitude", "MPV signal amplitude [mV]"),
        HistoInfo::new("amplitudeDefault_vs_xy", "AmplitudeDefault", "MPV signal amplitude [mV]"),
    ];
    if args.tight {
        log::info!(" >> Using tight cuts!");
        for info in infos.iter_mut() {
            info.in_name.push_str("_tight");
        }
    }

    let th2s = infos
        .iter()
        .map(|info| Ok(store.get_th3(&info.in_name)?.project_zx()))
        .collect::<Result<Vec<_>, AnalysisError>>()?;

    for (info, th2) in infos.iter().zip(&th2s) {
        let total = th2.entries();
        let threshold = BinStatistics::fit_threshold(total, th2.x.n_bins).ok_or(AnalysisError::NoBins)?;
        log::info!("{}: nEvents > {threshold:.2} (Total events: {total})", info.in_name);
    }

    let profiles: Vec<Profile> = if args.debug {
        let outdir_q = workspace::create_folder(&plots_dir, "q_AmpVsX0")?;
        infos
            .iter()
            .zip(&th2s)
            .map(|(info, th2)| estimate_debug(th2, info, params, position_center, &outdir_q, &style))
            .collect::<Result<_, _>>()?
    } else {
        let pb = pb_manager.add(ProgressBar::new(infos.len() as u64));
        pb.set_style(ProgressStyle::with_template("[{elapsed_precise}] {bar} {pos:>7}/{len:7} {msg}")?);
        let pb = Arc::new(Mutex::new(pb));

        let table = Arc::new(Mutex::new(BTreeMap::new()));

        let handles = infos
            .iter()
            .enumerate()
            .map(|(idx, info)| {
                let analysis_file = analysis_file.clone();
                let in_name = info.in_name.clone();
                let table = Arc::clone(&table);
                let pb = Arc::clone(&pb);
                let no_cache = args.no_cache;

                tokio::spawn(async move {
                    let profile = if no_cache {
                        estimate_profile(&analysis_file, &in_name, &params).await
                    } else {
                        get_profile(&analysis_file, &in_name, &params).await
                    }?;
                    table.lock().await.insert(idx, profile);
                    pb.lock().await.inc(1);
                    Ok::<_, eyre::Error>(())
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.await??;
        }
        pb.lock().await.finish();

        let table = table.lock().await;
        table.values().cloned().collect()
    };

    let maxima = infos
        .iter()
        .zip(&profiles)
        .map(|(info, profile)| {
            let max_amp = profile.max_value();
            log::info!("{}: Max Amplitude = {max_amp:.3} mV", info.out_name);
            max_amp
        })
        .filter(|max_amp| *max_amp > 0.0)
        .collect::<Vec<_>>();
    if !maxima.is_empty() {
        let average = maxima.iter().mean();
        log::info!("Average Max Amplitude = {average:.2} mV; N of non-empty profiles: {}", maxima.len());
    }

    let sensor_info = catalog.sensor_info(&args.dataset);
    let boxes = store.strip_boxes(position_center);
    let mut outputfile = HistogramStore::new();

    for ((info, th2), profile) in infos.iter().zip(&th2s).zip(&profiles) {
        let (xmin, xmax) = th2.x.shifted_limits(position_center);
        let hist = profile.to_hist(xmin, xmax);

        let save_path = plots_dir.join(format!(
            "{}_vs_x{}",
            info.out_name,
            if args.tight { "-tight" } else { "" }
        ));
        save_amplitude_vs_x(
            &save_path,
            &AmplitudePlot {
                hist: &hist,
                strip_boxes: &boxes,
                xlength: args.xlength,
                ylength: args.ylength,
                ylabel: info.ylabel,
                sensor_info: &sensor_info,
            },
            &style,
        )?;

        outputfile.insert(info.out_name, hist);
    }

    let output_path = plots_dir.join(format!(
        "AmplitudeVsX{}.bin",
        if args.tight { "_tight" } else { "" }
    ));
    outputfile.save(&output_path)?;
    log::info!("Profiles written to {}", output_path.to_string_lossy());

    Ok(())
}
