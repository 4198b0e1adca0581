use super::*;

fn plot(w: u32, h: u32) -> PlotSize {
    PlotSize {
        width: w,
        height: h,
    }
}

#[test]
fn create_get_destroy_lifecycle() {
    let mut a = TraceArena::new();
    a.create(TraceId(1), plot(8, 4)).unwrap();
    a.create(TraceId(2), plot(8, 4)).unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a.get(TraceId(1)).unwrap().intensity.width(), 8);

    assert!(a.create(TraceId(1), plot(8, 4)).is_err());
    assert!(a.destroy(TraceId(1)));
    assert!(!a.destroy(TraceId(1)));
    assert!(a.get(TraceId(1)).is_none());

    let st = a.stats();
    assert_eq!(st.created, 2);
    assert_eq!(st.destroyed, 1);
    assert_eq!(st.live_slots, 1);
    assert_eq!(st.live_bytes, 8 * 4 * 4);
}

#[test]
fn freed_positions_are_reused() {
    let mut a = TraceArena::new();
    a.create(TraceId(1), plot(2, 2)).unwrap();
    a.create(TraceId(2), plot(2, 2)).unwrap();
    a.destroy(TraceId(1));
    a.create(TraceId(3), plot(2, 2)).unwrap();
    assert_eq!(a.entries.len(), 2);

    let mut ids: Vec<_> = a.iter_mut().map(|(id, _)| id).collect();
    ids.sort();
    assert_eq!(ids, vec![TraceId(2), TraceId(3)]);
}

#[test]
fn resize_reallocates_zeroed() {
    let mut a = TraceArena::new();
    a.create(TraceId(7), plot(2, 2)).unwrap();
    a.get(TraceId(7)).unwrap().intensity.fill(1.0);

    a.resize(TraceId(7), plot(2, 2)).unwrap();
    assert_eq!(a.get(TraceId(7)).unwrap().intensity.get(0, 0), 1.0);
    assert_eq!(a.stats().resized, 0);

    a.resize(TraceId(7), plot(3, 5)).unwrap();
    let slot = a.get(TraceId(7)).unwrap();
    assert_eq!(slot.intensity.size(), plot(3, 5));
    assert_eq!(slot.intensity.column_sum(0), 0.0);
    assert_eq!(a.stats().resized, 1);
    assert_eq!(a.stats().live_bytes, 3 * 5 * 4);

    assert!(a.resize(TraceId(8), plot(1, 1)).is_err());
}

#[test]
fn failed_allocation_leaves_arena_untouched() {
    let mut a = TraceArena::new();
    let err = a
        .create(TraceId(1), plot(u32::MAX, u32::MAX))
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(a.is_empty());
    assert_eq!(a.stats().created, 0);
}
