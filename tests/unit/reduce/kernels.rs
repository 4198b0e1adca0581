use std::sync::Arc;

use super::*;
use crate::foundation::core::PlotSize;
use crate::geometry::planner::{IndexCache, PlanRequest, plan_geometry};
use crate::geometry::view::{TraceRole, ViewWindow};
use crate::waveform::model::Waveform;

fn plan(
    wfm: &Arc<Waveform>,
    ppx: f64,
    plot: (u32, u32),
    role: TraceRole,
    persist: f32,
) -> RenderGeometry {
    let view = ViewWindow {
        pixels_per_x_unit: ppx,
        x_axis_offset: 0,
        plot: PlotSize {
            width: plot.0,
            height: plot.1,
        },
        y_offset: 0.0,
        y_scale: 4.0,
    };
    let req = PlanRequest {
        waveform: Some(wfm),
        view: &view,
        role,
        base_alpha: 1.0,
        persist_scale: persist,
        full_recompute: true,
    };
    plan_geometry(&req, &mut IndexCache::default()).unwrap()
}

fn buffer_for(g: &RenderGeometry) -> IntensityBuffer {
    IntensityBuffer::new(PlotSize {
        width: g.config.plot_width,
        height: g.config.plot_height,
    })
    .unwrap()
}

fn run(g: &RenderGeometry, buf: &IntensityBuffer, zero_hold: bool) {
    let s = ReductionStrategy::select(&g.waveform, zero_hold).unwrap();
    reduce(g, s, buf, 4).unwrap();
}

fn nonzero_rows(buf: &IntensityBuffer, col: u32) -> Vec<u32> {
    (0..buf.height()).filter(|&r| buf.get(col, r) != 0.0).collect()
}

fn lane(base: f32, height: f32) -> TraceRole {
    TraceRole::Overlay {
        lane_base_px: base,
        lane_height_px: height,
    }
}

#[test]
fn single_sample_lights_exactly_one_column() {
    let w = Arc::new(
        Waveform::sparse(1, vec![0], vec![1], Samples::Analog(vec![1.0])).unwrap(),
    );
    let g = plan(&w, 1.0, (100, 32), TraceRole::Primary, 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, false);

    let lit: Vec<u32> = (0..100).filter(|&c| buf.column_sum(c) != 0.0).collect();
    assert_eq!(lit, vec![0]);
    assert_eq!(nonzero_rows(&buf, 0), vec![11]);
    assert_eq!(buf.get(0, 11), g.config.alpha);
}

#[test]
fn dense_segments_are_clipped_per_column() {
    let w = Arc::new(Waveform::uniform_analog(1, vec![0.0, 1.0]));
    let g = plan(&w, 4.0, (8, 16), lane(0.0, 8.0), 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, false);

    assert_eq!(nonzero_rows(&buf, 0), vec![13, 14, 15]);
    assert_eq!(nonzero_rows(&buf, 1), vec![11, 12, 13]);
    assert!(buf.column_sum(3) > 0.0);
    assert_eq!(nonzero_rows(&buf, 4), vec![7]);
    for c in 5..8 {
        assert_eq!(buf.column_sum(c), 0.0, "column {c}");
    }
}

#[test]
fn zero_hold_draws_flat_levels_and_a_riser() {
    let w = Arc::new(
        Waveform::sparse(1, vec![0, 10], vec![10, 10], Samples::Analog(vec![0.0, 2.0]))
            .unwrap(),
    );
    let g = plan(&w, 0.5, (12, 32), TraceRole::Primary, 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, true);

    for c in 0..5 {
        assert_eq!(nonzero_rows(&buf, c), vec![15], "column {c}");
    }
    assert_eq!(nonzero_rows(&buf, 5), (7..=14).collect::<Vec<_>>());
    for c in 6..10 {
        assert_eq!(nonzero_rows(&buf, c), vec![7], "column {c}");
    }
    assert_eq!(buf.column_sum(10), 0.0);
    assert_eq!(buf.column_sum(11), 0.0);
}

#[test]
fn digital_marks_each_touched_row_once() {
    let bits = vec![false, false, false, true, true, true, true, false];
    let w = Arc::new(Waveform::uniform(1, Samples::Digital(bits)));
    let g = plan(&w, 0.5, (4, 16), TraceRole::Primary, 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, false);
    let a = g.config.alpha;

    assert_eq!(nonzero_rows(&buf, 0), vec![7]);
    assert_eq!(nonzero_rows(&buf, 1), vec![3, 4, 5, 6, 7]);
    assert_eq!(nonzero_rows(&buf, 2), vec![3]);
    assert_eq!(nonzero_rows(&buf, 3), vec![3, 4, 5, 6, 7]);
    for r in 3..=7 {
        assert_eq!(buf.get(1, r), a);
    }
    assert_eq!(buf.get(0, 7), a);
}

#[test]
fn histogram_sums_bucket_counts_per_column() {
    let w = Arc::new(Waveform::uniform(
        1,
        Samples::Histogram(vec![1.0, 2.0, 3.0, 4.0]),
    ));
    let g = plan(&w, 0.5, (2, 32), lane(2.0, 1.0), 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, false);

    assert_eq!(nonzero_rows(&buf, 0).len(), 4);
    assert_eq!(nonzero_rows(&buf, 1).len(), 8);
}

#[test]
fn persistence_off_keeps_only_latest_frame() {
    let a = Arc::new(Waveform::uniform_analog(
        1,
        (0..64).map(|i| ((i * 7) % 5) as f32 - 2.0).collect(),
    ));
    let b = Arc::new(Waveform::uniform_analog(
        1,
        (0..64).map(|i| ((i * 3) % 4) as f32 - 1.5).collect(),
    ));
    let ga = plan(&a, 0.5, (32, 32), TraceRole::Primary, 0.0);
    let gb = plan(&b, 0.5, (32, 32), TraceRole::Primary, 0.0);

    let reused = buffer_for(&ga);
    run(&ga, &reused, false);
    run(&gb, &reused, false);

    let fresh = buffer_for(&gb);
    run(&gb, &fresh, false);
    assert_eq!(reused.to_vec(), fresh.to_vec());
}

#[test]
fn persistence_on_decays_old_contributions_geometrically() {
    let w = Arc::new(
        Waveform::sparse(1, vec![50], vec![1], Samples::Analog(vec![1.0])).unwrap(),
    );
    let d = 0.5f32;
    let g = plan(&w, 1.0, (100, 32), TraceRole::Primary, d);
    let buf = buffer_for(&g);
    buf.add(3, 0, 1.0);

    for k in 1..=4 {
        run(&g, &buf, false);
        assert!((buf.get(3, 0) - d.powi(k)).abs() < 1e-6, "frame {k}");
    }
}

#[test]
fn group_width_does_not_change_the_result() {
    let w = Arc::new(Waveform::uniform_analog(
        1,
        (0..500).map(|i| (i as f32 * 0.37).sin()).collect(),
    ));
    let g = plan(&w, 0.3, (97, 40), TraceRole::Primary, 0.0);
    let s = ReductionStrategy::select(&w, false).unwrap();

    let reference = buffer_for(&g);
    reduce(&g, s, &reference, 1).unwrap();
    for group in [3, 16, 1000] {
        let buf = buffer_for(&g);
        reduce(&g, s, &buf, group).unwrap();
        assert_eq!(buf.to_vec(), reference.to_vec(), "group {group}");
    }
}

#[test]
fn mismatched_inputs_are_rejected() {
    let w = Arc::new(Waveform::uniform_analog(1, vec![0.0, 1.0]));
    let g = plan(&w, 1.0, (8, 8), TraceRole::Primary, 0.0);

    let small = IntensityBuffer::new(PlotSize {
        width: 4,
        height: 8,
    })
    .unwrap();
    let err = reduce(&g, ReductionStrategy::AnalogDense, &small, 4).unwrap_err();
    assert!(matches!(err, ScopeError::Validation(_)));

    let buf = buffer_for(&g);
    let err = reduce(&g, ReductionStrategy::Histogram, &buf, 4).unwrap_err();
    assert!(matches!(err, ScopeError::UnsupportedVariant(_)));
    let err = reduce(&g, ReductionStrategy::AnalogDense, &buf, 0).unwrap_err();
    assert!(matches!(err, ScopeError::Validation(_)));
}

/// Five bursts of 50 one-tick samples, each burst starting 1050 ticks after the previous one.
fn burst_offsets() -> Vec<i64> {
    (0..5i64)
        .flat_map(|k| (0..50).map(move |j| k * 1050 + j))
        .collect()
}

fn lit_columns(buf: &IntensityBuffer) -> Vec<u32> {
    (0..buf.width()).filter(|&c| buf.column_sum(c) != 0.0).collect()
}

#[test]
fn gapped_bursts_zoomed_out_cover_every_column_they_span() {
    let offsets = burst_offsets();
    let n = offsets.len();
    let levels: Vec<f32> = (0..n).map(|i| (i / 50) as f32 - 2.0).collect();
    let bits: Vec<bool> = (0..n).map(|i| (i / 50) % 2 == 1).collect();
    let analog = Arc::new(
        Waveform::sparse(1, offsets.clone(), vec![1; n], Samples::Analog(levels)).unwrap(),
    );
    let digital =
        Arc::new(Waveform::sparse(1, offsets, vec![1; n], Samples::Digital(bits)).unwrap());

    // 64 ticks per column: each burst fits in one or two columns, gaps span ~15 columns.
    let ppx = 1.0 / 64.0;
    let expected: Vec<u32> = (0..=66).collect();

    let g = plan(&analog, ppx, (80, 32), TraceRole::Primary, 0.0);
    let held = buffer_for(&g);
    run(&g, &held, true);
    assert_eq!(lit_columns(&held), expected);
    for c in 1..16 {
        assert_eq!(nonzero_rows(&held, c), vec![23], "first gap, column {c}");
    }
    for c in 17..32 {
        assert_eq!(nonzero_rows(&held, c), vec![19], "second gap, column {c}");
    }

    let interp = buffer_for(&g);
    run(&g, &interp, false);
    assert_eq!(lit_columns(&interp), expected);

    let g = plan(&digital, ppx, (80, 16), TraceRole::Primary, 0.0);
    let dig = buffer_for(&g);
    run(&g, &dig, false);
    assert_eq!(lit_columns(&dig), expected);
    for c in 1..16 {
        assert_eq!(nonzero_rows(&dig, c), vec![7], "low burst held, column {c}");
    }
    for c in 17..32 {
        assert_eq!(nonzero_rows(&dig, c), vec![3], "high burst held, column {c}");
    }
}

#[test]
fn sparse_digital_marks_presence_per_column() {
    // 8 ticks per column; every column's first sample starts exactly on its left edge.
    let offsets = vec![0, 2, 5, 8, 10, 11, 15, 16, 17, 48, 49, 55];
    let bits = vec![
        false, false, false, true, true, true, true, false, true, false, false, true,
    ];
    let n = offsets.len();
    let w = Arc::new(Waveform::sparse(1, offsets, vec![1; n], Samples::Digital(bits)).unwrap());
    let g = plan(&w, 0.125, (8, 16), TraceRole::Primary, 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, false);
    let a = g.config.alpha;

    let both: Vec<u32> = (3..=7).collect();
    assert_eq!(nonzero_rows(&buf, 0), vec![7]);
    assert_eq!(nonzero_rows(&buf, 1), vec![3]);
    assert_eq!(nonzero_rows(&buf, 2), both);
    for c in 3..6 {
        assert_eq!(nonzero_rows(&buf, c), vec![3], "held high, column {c}");
    }
    assert_eq!(nonzero_rows(&buf, 6), both);
    assert_eq!(buf.column_sum(7), 0.0);

    // Four high samples in column 1 still mark the row once.
    assert_eq!(buf.get(1, 3), a);
    assert_eq!(buf.get(0, 7), a);
}

#[test]
fn sparse_histogram_sums_buckets_starting_in_each_column() {
    let offsets = vec![0, 3, 6, 8, 14, 16, 32, 33, 34, 35, 36, 37, 38, 39];
    let counts = vec![
        1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
    ];
    let n = offsets.len();
    let w = Arc::new(
        Waveform::sparse(1, offsets, vec![1; n], Samples::Histogram(counts)).unwrap(),
    );
    let g = plan(&w, 0.125, (6, 32), lane(2.0, 1.0), 0.0);
    let buf = buffer_for(&g);
    run(&g, &buf, false);

    // A bar of height `total` spans rows (29 - total)..=29.
    let bar = |total: u32| -> Vec<u32> { (29 - total..=29).collect() };
    assert_eq!(nonzero_rows(&buf, 0), bar(6));
    assert_eq!(nonzero_rows(&buf, 1), bar(9));
    assert_eq!(nonzero_rows(&buf, 2), bar(10));
    // No bucket starts in column 3; the one from column 2 still covers it.
    assert_eq!(nonzero_rows(&buf, 3), bar(10));
    assert_eq!(nonzero_rows(&buf, 4), bar(8));
    assert_eq!(buf.column_sum(5), 0.0);
}
