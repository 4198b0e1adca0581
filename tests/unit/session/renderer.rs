use super::*;
use crate::foundation::core::PlotSize;
use crate::render::annotate::CursorOverlay;
use crate::waveform::model::Samples;

fn view(width: u32, height: u32) -> ViewWindow {
    ViewWindow {
        pixels_per_x_unit: 1.0,
        x_axis_offset: 0,
        plot: PlotSize { width, height },
        y_offset: 0.0,
        y_scale: 4.0,
    }
}

fn spec(id: u32, channel: u32, style: TraceStyle) -> TraceSpec {
    TraceSpec {
        id: TraceId(id),
        channel: ChannelId(channel),
        role: TraceRole::Primary,
        style,
    }
}

fn green() -> TraceStyle {
    TraceStyle::new(Rgb::new(0.0, 1.0, 0.0))
}

fn flat(v: f32) -> Arc<Waveform> {
    Arc::new(Waveform::uniform_analog(1, vec![v; 64]))
}

fn renderer(v: ViewWindow) -> ScopeRenderer {
    let mut r = ScopeRenderer::new(RendererOpts {
        threads: Some(2),
        ..RendererOpts::default()
    })
    .unwrap();
    r.set_view(v).unwrap();
    r
}

fn nonzero_columns(buf: &[f32], width: usize) -> Vec<usize> {
    let mut cols: Vec<usize> = buf
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(i, _)| i % width)
        .collect();
    cols.sort_unstable();
    cols.dedup();
    cols
}

/// Intensity a non-persistent renderer produces for `wfm` alone.
fn fresh_intensity(wfm: Arc<Waveform>) -> Vec<f32> {
    let store = ChannelStore::new();
    store.publish(ChannelId(0), wfm).unwrap();
    let mut r = renderer(view(32, 32));
    r.add_trace(spec(0, 0, green())).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    r.intensity(TraceId(0)).unwrap()
}

#[test]
fn zero_threads_is_rejected() {
    let err = ScopeRenderer::new(RendererOpts {
        threads: Some(0),
        ..RendererOpts::default()
    })
    .err()
    .unwrap();
    assert!(matches!(err, ScopeError::Validation(_)));
}

#[test]
fn render_requires_a_view() {
    let mut r = ScopeRenderer::new(RendererOpts::default()).unwrap();
    let err = r
        .render_frame(&ChannelStore::new(), &Annotations::new())
        .unwrap_err();
    assert!(matches!(err, ScopeError::Validation(_)));
}

#[test]
fn duplicate_trace_is_rejected() {
    let mut r = renderer(view(8, 8));
    r.add_trace(spec(1, 0, green())).unwrap();
    let err = r.add_trace(spec(1, 3, green())).unwrap_err();
    assert!(matches!(err, ScopeError::Validation(_)));
    assert_eq!(r.trace_ids(), vec![TraceId(1)]);
}

#[test]
fn single_sample_lights_one_column() {
    let store = ChannelStore::new();
    let wfm = Waveform::sparse(1, vec![0], vec![1], Samples::Analog(vec![1.0])).unwrap();
    store.publish(ChannelId(0), Arc::new(wfm)).unwrap();

    let mut r = renderer(view(100, 32));
    r.add_trace(spec(0, 0, green())).unwrap();
    let frame = r.render_frame(&store, &Annotations::new()).unwrap().unwrap();

    assert_eq!((frame.width, frame.height), (100, 32));
    let buf = r.intensity(TraceId(0)).unwrap();
    assert_eq!(nonzero_columns(&buf, 100), vec![0]);
    assert_eq!(
        r.last_stats(),
        FrameStats {
            traces_total: 1,
            traces_rendered: 1,
            traces_skipped: 0,
        }
    );
}

#[test]
fn invalid_trace_is_skipped_while_others_render() {
    let store = ChannelStore::new();
    store
        .publish(ChannelId(1), Arc::new(Waveform::uniform_analog(0, vec![1.0; 8])))
        .unwrap();
    store.publish(ChannelId(2), flat(1.0)).unwrap();

    let mut r = renderer(view(32, 32));
    r.add_trace(spec(1, 1, green())).unwrap();
    r.add_trace(spec(2, 2, green())).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap().unwrap();

    let stats = r.last_stats();
    assert_eq!(stats.traces_total, 2);
    assert_eq!(stats.traces_rendered, 1);
    assert_eq!(stats.traces_skipped, 1);
    assert!(r.intensity(TraceId(1)).unwrap().iter().all(|v| *v == 0.0));
    assert!(r.intensity(TraceId(2)).unwrap().iter().any(|v| *v > 0.0));
}

#[test]
fn missing_channel_counts_as_skipped() {
    let mut r = renderer(view(16, 16));
    r.add_trace(spec(0, 9, green())).unwrap();
    r.render_frame(&ChannelStore::new(), &Annotations::new())
        .unwrap()
        .unwrap();
    assert_eq!(r.last_stats().traces_skipped, 1);
}

#[test]
fn unsupported_variant_is_skipped_and_logged_once() {
    let store = ChannelStore::new();
    let bus = Waveform::uniform(1, Samples::DigitalBus(vec![vec![true, false]; 8]));
    store.publish(ChannelId(0), Arc::new(bus)).unwrap();

    let mut r = renderer(view(16, 16));
    r.add_trace(spec(0, 0, green())).unwrap();
    for _ in 0..2 {
        r.render_frame(&store, &Annotations::new()).unwrap().unwrap();
        assert_eq!(r.last_stats().traces_skipped, 1);
    }
    assert!(r.traces[0].unsupported_logged);
    assert!(r.poisoned().is_none());
}

#[test]
fn persistence_off_keeps_only_latest_frame() {
    let store = ChannelStore::new();
    let mut r = renderer(view(32, 32));
    r.add_trace(spec(0, 0, green())).unwrap();

    store.publish(ChannelId(0), flat(2.0)).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    store.publish(ChannelId(0), flat(-2.0)).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();

    let got = r.intensity(TraceId(0)).unwrap();
    let want = fresh_intensity(flat(-2.0));
    assert_eq!(got.len(), want.len());
    for (a, b) in got.iter().zip(&want) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }
}

#[test]
fn persistence_on_decays_previous_frames() {
    let store = ChannelStore::new();
    let mut r = renderer(view(32, 32));
    let style = TraceStyle {
        persistence: true,
        decay: Some(0.5),
        ..green()
    };
    r.add_trace(spec(0, 0, style)).unwrap();

    store.publish(ChannelId(0), flat(2.0)).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    let first = r.intensity(TraceId(0)).unwrap();
    store.publish(ChannelId(0), flat(-2.0)).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    let second = r.intensity(TraceId(0)).unwrap();
    let latest = fresh_intensity(flat(-2.0));

    for i in 0..second.len() {
        let expected = 0.5 * first[i] + latest[i];
        assert!(
            (second[i] - expected).abs() < 1e-5,
            "cell {i}: {} != {expected}",
            second[i]
        );
    }
}

#[test]
fn view_change_clears_persistence() {
    let store = ChannelStore::new();
    store.publish(ChannelId(0), flat(2.0)).unwrap();
    let mut r = renderer(view(32, 32));
    let style = TraceStyle {
        persistence: true,
        decay: Some(0.5),
        ..green()
    };
    r.add_trace(spec(0, 0, style)).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    let first = r.intensity(TraceId(0)).unwrap();

    r.set_view(ViewWindow {
        y_scale: 2.0,
        ..view(32, 32)
    })
    .unwrap();
    store.publish(ChannelId(0), flat(-2.0)).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    let second = r.intensity(TraceId(0)).unwrap();

    let stale = first
        .iter()
        .zip(&second)
        .filter(|(a, b)| **a > 0.0 && **b > 0.0)
        .count();
    assert_eq!(stale, 0);
}

#[test]
fn resize_reallocates_trace_buffers() {
    let store = ChannelStore::new();
    store.publish(ChannelId(0), flat(1.0)).unwrap();
    let mut r = renderer(view(32, 32));
    r.add_trace(spec(0, 0, green())).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();

    r.set_view(view(48, 16)).unwrap();
    let frame = r.render_frame(&store, &Annotations::new()).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (48, 16));
    assert_eq!(r.intensity(TraceId(0)).unwrap().len(), 48 * 16);
    assert_eq!(r.arena_stats().resized, 1);
}

#[test]
fn loading_skips_frames() {
    let store = ChannelStore::new();
    store.publish(ChannelId(0), flat(1.0)).unwrap();
    let mut r = renderer(view(16, 16));
    r.add_trace(spec(0, 0, green())).unwrap();

    r.set_loading(true);
    assert!(r.render_frame(&store, &Annotations::new()).unwrap().is_none());
    r.set_loading(false);
    assert_eq!(
        r.traces[0].persistence.pending_clear(),
        Some(ClearReason::ChannelAdded)
    );
    assert!(r.render_frame(&store, &Annotations::new()).unwrap().is_some());
}

#[test]
fn remove_trace_frees_resources() {
    let mut r = renderer(view(16, 16));
    r.add_trace(spec(0, 0, green())).unwrap();
    r.add_trace(spec(1, 1, green())).unwrap();
    assert_eq!(r.arena_stats().live_slots, 2);

    assert!(r.remove_trace(TraceId(0)));
    assert!(!r.remove_trace(TraceId(0)));
    assert!(r.intensity(TraceId(0)).is_none());
    assert_eq!(r.arena_stats().live_slots, 1);
    assert_eq!(r.trace_ids(), vec![TraceId(1)]);
    assert_eq!(
        r.traces[0].persistence.pending_clear(),
        Some(ClearReason::ChannelAdded)
    );
}

#[test]
fn style_change_requests_clear() {
    let store = ChannelStore::new();
    store.publish(ChannelId(0), flat(1.0)).unwrap();
    let mut r = renderer(view(16, 16));
    r.add_trace(spec(0, 0, green())).unwrap();
    r.render_frame(&store, &Annotations::new()).unwrap();
    assert_eq!(r.traces[0].persistence.pending_clear(), None);

    r.set_trace_style(TraceId(0), TraceStyle::new(Rgb::new(1.0, 0.0, 0.0)))
        .unwrap();
    assert_eq!(
        r.traces[0].persistence.pending_clear(),
        Some(ClearReason::DisplaySettings)
    );
    assert!(r.set_trace_style(TraceId(7), green()).is_err());
}

#[test]
fn annotations_frame_the_traces() {
    let store = ChannelStore::new();
    let mut r = renderer(view(32, 32));
    let opts = r.opts().clone();

    let bare = r.render_frame(&store, &Annotations::new()).unwrap().unwrap();
    assert_eq!(bare.pixel(0, 0), Some([0, 0, 0, 255]));

    let annotations = Annotations::new().with(opts.graticule()).with(CursorOverlay {
        color: Rgb::new(1.0, 1.0, 1.0),
        time_cursors: vec![20],
        value_cursors: vec![],
        peaks: vec![],
    });
    let framed = r.render_frame(&store, &annotations).unwrap().unwrap();
    let top = opts.background_top.to_rgba8_premul();
    assert_eq!(framed.pixel(31, 0), Some([top.r, top.g, top.b, 255]));
    assert_eq!(framed.pixel(20, 16), Some([255, 255, 255, 255]));
}

#[test]
fn density_images_draw_over_traces() {
    use crate::render::density::{DensityKind, DensityRange};
    use crate::render::ramp::ColorRamp;

    let mut r = renderer(view(8, 8));
    let img = DensityImage::new(
        DensityKind::EyeDiagram,
        1,
        1,
        vec![1.0],
        ColorRamp::by_name("grayscale").unwrap(),
        DensityRange { min: 0.0, max: 1.0 },
    )
    .unwrap();
    r.add_density(img);
    let frame = r
        .render_frame(&ChannelStore::new(), &Annotations::new())
        .unwrap()
        .unwrap();
    assert_eq!(frame.pixel(4, 4), Some([255, 255, 255, 255]));

    r.clear_densities();
    let frame = r
        .render_frame(&ChannelStore::new(), &Annotations::new())
        .unwrap()
        .unwrap();
    assert_eq!(frame.pixel(4, 4), Some([0, 0, 0, 255]));
}

#[test]
fn invalid_trace_alpha_or_decay_is_rejected() {
    let mut r = renderer(view(16, 16));
    for alpha in [f32::NAN, f32::INFINITY, -0.5] {
        let err = r
            .add_trace(spec(0, 0, TraceStyle { alpha, ..green() }))
            .unwrap_err();
        assert!(matches!(err, ScopeError::Validation(_)), "alpha {alpha}");
    }
    let err = r
        .add_trace(spec(0, 0, TraceStyle { decay: Some(1.5), ..green() }))
        .unwrap_err();
    assert!(matches!(err, ScopeError::Validation(_)));
    assert!(r.trace_ids().is_empty());

    r.add_trace(spec(0, 0, TraceStyle { alpha: 0.0, ..green() }))
        .unwrap();
    let err = r
        .set_trace_style(TraceId(0), TraceStyle { alpha: f32::NAN, ..green() })
        .unwrap_err();
    assert!(matches!(err, ScopeError::Validation(_)));
    assert_eq!(r.traces[0].spec.style.alpha, 0.0);
}
