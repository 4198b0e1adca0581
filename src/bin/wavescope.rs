use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

const PALETTE: [&str; 4] = ["#f0e040", "#40d8f0", "#f040c8", "#60f060"];

#[derive(Parser, Debug)]
#[command(name = "wavescope", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one or more captures into a PNG plot.
    Render(RenderArgs),
    /// Rewrite a capture in another sample layout.
    Convert(ConvertArgs),
    /// Print capture metadata and sample statistics.
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Capture metadata JSON; repeat for several channels, drawn in order.
    #[arg(long = "in", required = true)]
    inputs: Vec<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Plot width in pixels.
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Plot height in pixels.
    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Pixels per femtosecond (default: fit the longest capture).
    #[arg(long)]
    ppx: Option<f64>,

    /// Time at the left edge, femtoseconds.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    offset: i64,

    /// Pixels per value unit (default: fit the analog value range).
    #[arg(long)]
    y_scale: Option<f32>,

    /// Value added before scaling (default: centre the analog value range).
    #[arg(long, allow_hyphen_values = true)]
    y_offset: Option<f32>,

    /// Trace color per input (`#RRGGBB`), cycling a default palette when omitted.
    #[arg(long = "color")]
    colors: Vec<String>,

    /// Hold analog samples flat instead of interpolating.
    #[arg(long)]
    zero_hold: bool,

    /// Renderer options JSON.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Skip the background gradient and grid.
    #[arg(long)]
    no_grid: bool,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input capture metadata JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,

    /// Output file stem (default: input stem).
    #[arg(long)]
    stem: Option<String>,

    /// Target layout.
    #[arg(long, value_enum)]
    format: FormatChoice,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Capture metadata JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Sparsev1,
    Densev1,
}

impl From<FormatChoice> for wavescope::SampleFormat {
    fn from(c: FormatChoice) -> Self {
        match c {
            FormatChoice::Sparsev1 => Self::SparseV1,
            FormatChoice::Densev1 => Self::DenseV1,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Convert(args) => cmd_convert(args),
        Command::Info(args) => cmd_info(args),
    };
    if let Err(e) = &out
        && e
            .downcast_ref::<wavescope::ScopeError>()
            .is_some_and(wavescope::ScopeError::is_fatal)
    {
        // Partially built compute state cannot be trusted; do not unwind through it.
        eprintln!("fatal: {e:#}");
        std::process::abort();
    }
    out
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = match &args.opts {
        Some(path) => {
            let s = std::fs::read_to_string(path)
                .with_context(|| format!("read renderer options '{}'", path.display()))?;
            wavescope::RendererOpts::from_json_str(&s)?
        }
        None => wavescope::RendererOpts::default(),
    }
    .with_env_overrides()?;

    let store = wavescope::ChannelStore::new();
    let mut captures = Vec::with_capacity(args.inputs.len());
    for (i, path) in args.inputs.iter().enumerate() {
        let (_, wfm) = wavescope::read_capture(&wavescope::CapturePaths::from_metadata(path))
            .with_context(|| format!("load capture '{}'", path.display()))?;
        let wfm = Arc::new(wfm);
        store.publish(wavescope::ChannelId(i as u32), wfm.clone())?;
        captures.push(wfm);
    }

    let plot = wavescope::PlotSize::new(args.width, args.height)?;
    let (fit_scale, fit_offset) = fit_values(&captures, args.height);
    let view = wavescope::ViewWindow {
        pixels_per_x_unit: args
            .ppx
            .unwrap_or_else(|| fit_time(&captures, args.width)),
        x_axis_offset: args.offset,
        plot,
        y_offset: args.y_offset.unwrap_or(fit_offset),
        y_scale: args.y_scale.unwrap_or(fit_scale),
    };

    let annotations = if args.no_grid {
        wavescope::Annotations::new()
    } else {
        wavescope::Annotations::new().with(opts.graticule())
    };

    let mut renderer = wavescope::ScopeRenderer::new(opts)?;
    renderer.set_view(view)?;
    let mut lanes = 0u32;
    for (i, wfm) in captures.iter().enumerate() {
        let hex = args
            .colors
            .get(i)
            .map(String::as_str)
            .unwrap_or(PALETTE[i % PALETTE.len()]);
        let role = if matches!(wfm.samples(), wavescope::Samples::Digital(_)) {
            lanes += 1;
            wavescope::TraceRole::Overlay {
                lane_base_px: 4.0 + 24.0 * (lanes - 1) as f32,
                lane_height_px: 16.0,
            }
        } else {
            wavescope::TraceRole::Primary
        };
        renderer.add_trace(wavescope::TraceSpec {
            id: wavescope::TraceId(i as u32),
            channel: wavescope::ChannelId(i as u32),
            role,
            style: wavescope::TraceStyle {
                zero_hold: args.zero_hold,
                ..wavescope::TraceStyle::new(wavescope::Rgb::parse_hex(hex)?)
            },
        })?;
    }

    let frame = renderer
        .render_frame(&store, &annotations)?
        .context("renderer skipped the frame")?;
    let stats = renderer.last_stats();
    if stats.traces_skipped > 0 {
        eprintln!(
            "warning: {} of {} traces could not be drawn",
            stats.traces_skipped, stats.traces_total
        );
    }

    ensure_parent_dir(&args.out)?;
    frame.save_png(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let (meta, wfm) = wavescope::read_capture(&wavescope::CapturePaths::from_metadata(
        &args.in_path,
    ))
    .with_context(|| format!("load capture '{}'", args.in_path.display()))?;

    let stem = match &args.stem {
        Some(s) => s.clone(),
        None => args
            .in_path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("input path has no usable file stem")?
            .to_owned(),
    };
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    let paths = wavescope::CapturePaths::new(&args.out_dir, &stem);
    if paths.metadata == args.in_path {
        anyhow::bail!("refusing to overwrite the input capture; choose another --out-dir or --stem");
    }
    let out = wavescope::write_capture(&wfm, args.format.into(), &paths)?;

    eprintln!(
        "converted {} samples {:?} -> {:?}: {}",
        wfm.len(),
        meta.format,
        out.format,
        paths.metadata.display()
    );
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let (meta, wfm) = wavescope::read_capture(&wavescope::CapturePaths::from_metadata(
        &args.in_path,
    ))
    .with_context(|| format!("load capture '{}'", args.in_path.display()))?;

    println!("{}", serde_json::to_string_pretty(&meta)?);
    println!("samples: {} ({})", wfm.len(), wfm.samples().kind_name());
    println!("span: {} ticks", wfm.time_span_ticks());
    println!("average spacing: {:.3} ticks", wfm.average_spacing_ticks());
    if let Some((lo, hi)) = value_range(&wfm) {
        println!("values: [{lo}, {hi}]");
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

/// Zoom that fits the longest capture across the plot.
fn fit_time(captures: &[Arc<wavescope::Waveform>], width: u32) -> f64 {
    let span_fs = captures
        .iter()
        .map(|w| (w.time_span_ticks() as f64 * w.timescale() as f64).abs())
        .fold(0.0_f64, f64::max);
    if span_fs > 0.0 {
        f64::from(width) / span_fs
    } else {
        1.0
    }
}

/// Scale and offset that fit the analog value range into 80% of the plot height.
fn fit_values(captures: &[Arc<wavescope::Waveform>], height: u32) -> (f32, f32) {
    let range = captures
        .iter()
        .filter(|w| !matches!(w.samples(), wavescope::Samples::Digital(_)))
        .filter_map(|w| value_range(w))
        .reduce(|(a, b), (c, d)| (a.min(c), b.max(d)));
    let Some((lo, hi)) = range else {
        return (1.0, 0.0);
    };
    let span = (hi - lo).max(f32::EPSILON);
    (0.8 * height as f32 / span, -(lo + hi) / 2.0)
}

fn value_range(wfm: &wavescope::Waveform) -> Option<(f32, f32)> {
    let fold = |it: &mut dyn Iterator<Item = f32>| {
        it.filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    };
    match wfm.samples() {
        wavescope::Samples::Analog(v) | wavescope::Samples::Histogram(v) => {
            fold(&mut v.iter().copied())
        }
        wavescope::Samples::Digital(v) => fold(&mut v.iter().map(|b| f32::from(u8::from(*b)))),
        wavescope::Samples::DigitalBus(_) => None,
    }
}
