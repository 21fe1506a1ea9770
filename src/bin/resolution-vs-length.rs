//! Position resolution of EIC sensors as a function of strip length.

use std::path::PathBuf;

use clap::Parser;
use itertools::izip;
use unzip_n::unzip_n;

use lgad_analysis::{
    render::{save_graph, GraphPlot, Series},
    style::PlotStyle,
    workspace, SensorCatalog,
};

unzip_n!(4);

/// Uncertainty assigned to the single strip RMS, um
const ONE_STRIP_ERR: f64 = 0.01;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Sensor catalog with geometry and resolution per sensor configuration
    #[clap(short, long, default_value = "data/sensors.json")]
    catalog: PathBuf,
    /// Sensor configurations to compare
    #[clap(
        short,
        long,
        num_args = 1..,
        default_values_t = [
            "EIC_W1_2p5cm_500up_200uw_215V".to_owned(),
            "EIC_W1_1cm_500up_200uw_255V".to_owned(),
            "EIC_W1_0p5cm_500up_200uw_1_4_245V".to_owned(),
        ]
    )]
    sensors: Vec<String>,
    /// Output folder name inside the workspace
    #[clap(short, long, default_value = "Paper2022")]
    folder: String,
    /// Max value on the y axis
    #[clap(short = 'y', long, default_value_t = 90.0)]
    ymax: f64,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let catalog = SensorCatalog::load(&args.catalog)?;

    let (length, one_strip, two_strips, two_strips_err) = args
        .sensors
        .iter()
        .map(|name| {
            let geometry = catalog.geometry(name)?;
            let resolution = catalog.resolution(name)?;
            log::info!(
                "{name}: length {} mm, one strip {} um, two strips {} +- {} um",
                geometry.length,
                resolution.one_strip_rms,
                resolution.two_strips,
                resolution.two_strips_err
            );
            Ok((
                geometry.length,
                resolution.one_strip_rms,
                resolution.two_strips,
                resolution.two_strips_err,
            ))
        })
        .collect::<Result<Vec<_>, lgad_analysis::error::AnalysisError>>()?
        .into_iter()
        .unzip_n_vec();

    if length.is_empty() {
        eyre::bail!("no sensors selected");
    }

    let fit: Result<(f64, f64), _> = linreg::linear_regression(&length, &two_strips);
    match fit {
        Ok((slope, intercept)) => {
            log::info!("Two strip resolution trend: {slope:.3} um/mm (intercept {intercept:.2} um)")
        }
        Err(err) => log::warn!("no trend for two strip resolution: {err:?}"),
    }

    let series = [
        Series {
            label: "Exactly one strip reconstruction".to_owned(),
            color: 0,
            points: izip!(&length, &one_strip)
                .map(|(x, y)| (*x, *y, ONE_STRIP_ERR))
                .collect(),
        },
        Series {
            label: "Two strip reconstruction".to_owned(),
            color: 2,
            points: izip!(&length, &two_strips, &two_strips_err)
                .map(|(x, y, err)| (*x, *y, *err))
                .collect(),
        },
    ];

    let x_min = length.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = length.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let outdir = workspace::create_folder(&workspace::get_workspace(), &args.folder)?;
    let stem = outdir.join("resolution_vs_length_EIC");
    save_graph(
        &stem,
        &GraphPlot {
            series: &series,
            x_range: (x_min - 5.0, x_max + 5.0),
            y_max: args.ymax,
            xlabel: "Strip length [mm]",
            ylabel: "Position resolution [\u{3bc}m]",
            corner_text: "Varying length",
        },
        &PlotStyle::default(),
    )?;
    log::info!("Saved {}", stem.to_string_lossy());

    Ok(())
}
