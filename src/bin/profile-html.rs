use std::path::PathBuf;

use clap::Parser;
use plotly::{
    common::{Line, LineShape, Title},
    layout::Axis,
    Layout, Plot, Scatter,
};

use lgad_analysis::store::{Histogram, HistogramStore, STRIP_INFO_PREFIX};

/// Interactive view of every profile in an output store
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Store written by amplitude-vs-x
    store: PathBuf,
    /// Html file to write; opened in a browser when omitted
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Max value on the y axis
    #[clap(short = 'y', long, default_value_t = 150.0)]
    ylength: f64,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let store = HistogramStore::load(&args.store)?;

    let mut names = store
        .names()
        .filter(|name| !name.starts_with(STRIP_INFO_PREFIX))
        .collect::<Vec<_>>();
    names.sort_by(|a, b| natord::compare(a, b));

    let mut plot = Plot::new();
    let layout = Layout::new()
        .title(Title::new(&args.store.to_string_lossy()))
        .x_axis(Axis::new().title(Title::new("Track x position [mm]")))
        .y_axis(
            Axis::new()
                .range(vec![0.0, args.ylength])
                .title(Title::new("MPV signal amplitude [mV]")),
        )
        .height(800);
    plot.set_layout(layout);

    for name in names {
        // only profiles are drawn
        let Ok(Histogram::H1(hist)) = store.get(name) else {
            continue;
        };
        let (x, y): (Vec<_>, Vec<_>) = hist.bins().unzip();
        let trace = Scatter::new(x, y)
            .line(Line::new().shape(LineShape::Hvh))
            .name(name);
        plot.add_trace(trace);
    }

    match args.output {
        Some(path) => plot.write_html(path),
        None => plot.show(),
    }

    Ok(())
}
