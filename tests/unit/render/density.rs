use super::*;

fn gray() -> ColorRamp {
    ColorRamp::by_name("grayscale").unwrap()
}

const UNIT: DensityRange = DensityRange { min: 0.0, max: 1.0 };

#[test]
fn construction_validates_shape_and_range() {
    assert!(DensityImage::new(DensityKind::Spectrogram, 2, 2, vec![0.0; 3], gray(), UNIT).is_err());
    assert!(DensityImage::new(DensityKind::Spectrogram, 0, 2, vec![], gray(), UNIT).is_err());
    let inverted = DensityRange { min: 1.0, max: 0.0 };
    assert!(DensityImage::new(DensityKind::Spectrogram, 1, 1, vec![0.0], gray(), inverted).is_err());
}

#[test]
fn empty_and_nan_cells_are_transparent() {
    let img = DensityImage::new(
        DensityKind::EyeDiagram,
        3,
        1,
        vec![0.0, f32::NAN, 0.001],
        gray(),
        UNIT,
    )
    .unwrap();
    assert_eq!(img.cell_color(0, 0), [0; 4]);
    assert_eq!(img.cell_color(1, 0), [0; 4]);
    assert_eq!(img.cell_color(2, 0)[3], 255);
}

#[test]
fn nearest_neighbour_sampling_covers_the_plot() {
    let img = DensityImage::new(DensityKind::Spectrogram, 2, 2, vec![1.0, 0.0, 0.0, 1.0], gray(), UNIT)
        .unwrap();
    assert_eq!(img.sample_for_plot(0, 0, 10, 10)[0], 255);
    assert_eq!(img.sample_for_plot(9, 0, 10, 10), [0; 4]);
    assert_eq!(img.sample_for_plot(9, 9, 10, 10)[0], 255);
    assert_eq!(img.sample_for_plot(4, 5, 10, 10), [0; 4]);
}

#[test]
fn waterfall_scrolls_newest_on_top() {
    let mut w = WaterfallScroller::new(2, 3).unwrap();
    assert!(w.push_row(&[1.0]).is_err());
    for v in [0.2, 0.4, 0.6, 0.8] {
        w.push_row(&[v, v]).unwrap();
    }
    assert_eq!(w.len(), 3);

    let img = w.to_image(gray(), UNIT).unwrap();
    assert_eq!(img.kind(), DensityKind::Waterfall);
    assert_eq!(img.height(), 3);
    let top = img.cell_color(0, 0)[0];
    let bottom = img.cell_color(0, 2)[0];
    assert!(top > bottom, "newest row brightest: {top} vs {bottom}");
}

#[test]
fn partially_filled_waterfall_is_transparent_below() {
    let mut w = WaterfallScroller::new(1, 4).unwrap();
    w.push_row(&[1.0]).unwrap();
    let img = w.to_image(gray(), UNIT).unwrap();
    assert_eq!(img.cell_color(0, 0)[3], 255);
    assert_eq!(img.cell_color(0, 3), [0; 4]);
}

#[test]
fn out_of_range_cells_are_transparent() {
    let img = DensityImage::new(DensityKind::Spectrogram, 2, 2, vec![1.0; 4], gray(), UNIT).unwrap();
    assert_eq!(img.cell_color(1, 1)[3], 255);
    assert_eq!(img.cell_color(2, 0), [0; 4]);
    assert_eq!(img.cell_color(0, 2), [0; 4]);
    assert_eq!(img.cell_color(u32::MAX, u32::MAX), [0; 4]);
}
