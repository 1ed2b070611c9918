use subreg::lowlevel::{refine_extremum, TemplatePlan};
use subreg::{
    Better, CorrelationSurface, ImageView, NoDataRaster, OwnedImage, ParameterSet, RasterSource,
    RegError, Roi, SubpixelMethod,
};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0f32; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        RegError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );

    let err = ImageView::new(&data, 4, 1, 3).err().unwrap();
    assert_eq!(
        err,
        RegError::InvalidStride {
            width: 4,
            stride: 3,
        }
    );

    let err = ImageView::new(&data[..3], 2, 2, 2).err().unwrap();
    assert_eq!(err, RegError::BufferTooSmall { needed: 4, got: 3 });
}

#[test]
fn image_view_roi_matches_expected_values() {
    let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let view = ImageView::from_slice(&data, 4, 4).unwrap();

    let roi = view.roi(1, 1, 2, 2).unwrap();
    assert_eq!(roi.shape(), (2, 2));
    assert_eq!(roi.stride(), 4);
    assert_eq!(roi.row(0).unwrap(), &[5.0, 6.0]);
    assert_eq!(roi.row(1).unwrap(), &[9.0, 10.0]);
    assert!(roi.get(2, 0).is_none());

    let err = view.roi(3, 3, 2, 2).err().unwrap();
    assert_eq!(
        err,
        RegError::RoiOutOfBounds {
            x: 3,
            y: 3,
            width: 2,
            height: 2,
            img_width: 4,
            img_height: 4,
        }
    );
}

#[test]
fn template_plan_matches_known_stats() {
    let tpl = OwnedImage::new(vec![0.0, 1.0, 2.0, 3.0], 2, 2).unwrap();
    let plan = TemplatePlan::from_view(tpl.view()).unwrap();
    assert_eq!(plan.area(), 4);
    assert!((plan.mean() - 1.5).abs() < 1e-12);
    assert!((plan.var_t() - 5.0).abs() < 1e-12);
    assert!((plan.sum_sq() - 14.0).abs() < 1e-12);

    let flat = OwnedImage::filled(3, 3, 5.0).unwrap();
    assert_eq!(
        TemplatePlan::from_view(flat.view()).err(),
        Some(RegError::DegenerateWindow {
            reason: "zero variance"
        })
    );
}

#[test]
fn roi_windows_never_leave_the_raster() {
    let img = OwnedImage::from_fn(40, 30, |x, y| (x + 40 * y) as f32).unwrap();
    let (w, h) = (40.0, 30.0);
    let centers = [
        (0.0, 0.0),
        (w - 1.0, 0.0),
        (0.0, h - 1.0),
        (w - 1.0, h - 1.0),
        (w / 2.0, 0.0),
        (w / 2.0, h - 1.0),
        (0.0, h / 2.0),
        (w - 1.0, h / 2.0),
        (0.4, 29.9),
        (39.7, 0.2),
    ];
    for &(x, y) in &centers {
        for half in [1usize, 5, 12, 50] {
            let roi = Roi::new(&img, x, y, half, half).unwrap();
            let window = roi.clip().unwrap();
            let b = window.bounds();
            assert!(b.x1 < 40 && b.y1 < 30, "{b:?} at ({x}, {y})");
            assert_eq!(window.shape(), (b.width(), b.height()));
            // The window shrinks on the clipped side only.
            let (cx, cy) = (x.trunc() as usize, y.trunc() as usize);
            assert_eq!(b.x0, cx.saturating_sub(half));
            assert_eq!(b.y0, cy.saturating_sub(half));
            assert_eq!(b.x1, (cx + half).min(39));
            assert_eq!(b.y1, (cy + half).min(29));
            assert_eq!(window.image().get(0, 0), img.get(b.x0, b.y0));
        }
    }
}

#[test]
fn roi_keeps_fractional_residual() {
    let img = OwnedImage::filled(20, 20, 1.0).unwrap();
    let roi = Roi::new(&img, 10.75, 4.25, 3, 2).unwrap();
    assert_eq!(roi.center_pixel(), (10, 4));
    let (rx, ry) = roi.residual();
    assert!((rx - 0.75).abs() < 1e-12 && (ry - 0.25).abs() < 1e-12);
    assert!(!roi.is_clipped());
    let window = roi.clip().unwrap();
    assert_eq!(window.shape(), (7, 5));
    assert_eq!(window.geometric_center(), (10.0, 4.0));
}

#[test]
fn roi_outside_the_raster_is_an_error() {
    let img = OwnedImage::filled(20, 20, 1.0).unwrap();
    assert!(matches!(
        Roi::new(&img, 45.0, 5.0, 3, 3),
        Err(RegError::WindowOutOfBounds { .. })
    ));
    assert!(Roi::new(&img, f64::NAN, 5.0, 3, 3).is_err());
}

#[test]
fn window_validity_and_variance() {
    let mut data: Vec<f32> = (0..100).map(|v| (v % 7) as f32).collect();
    data[55] = -9999.0;
    let img = OwnedImage::new(data, 10, 10).unwrap();
    let tagged = NoDataRaster::new(img.clone(), -9999.0);
    assert_eq!(tagged.no_data(), Some(-9999.0));

    let bad = Roi::new(&tagged, 5.0, 5.0, 2, 2).unwrap().clip().unwrap();
    assert!(!bad.is_valid());
    assert_eq!(bad.ensure_matchable(), Err(RegError::NoData));

    let good = Roi::new(&tagged, 2.0, 2.0, 1, 1).unwrap().clip().unwrap();
    assert!(good.is_valid());
    assert!(good.variance() > 0.0);

    let flat = OwnedImage::filled(10, 10, 3.0).unwrap();
    let window = Roi::new(&flat, 5.0, 5.0, 2, 2).unwrap().clip().unwrap();
    assert_eq!(window.variance(), 0.0);
    assert!(matches!(
        window.ensure_matchable(),
        Err(RegError::DegenerateWindow { .. })
    ));
}

#[test]
fn parameter_sets_round_to_odd_sizes() {
    let p = ParameterSet::new((120, 121), (60, 61)).unwrap();
    assert_eq!(p.image_size(), (121, 121));
    assert_eq!(p.template_size(), (61, 61));
    assert_eq!(p.image_half(), (60, 60));
    assert_eq!(p.template_half(), (30, 30));
    assert!(ParameterSet::square(31, 35).is_err());
}

#[test]
fn refinement_sentinel_near_surface_edges() {
    let (w, h) = (13usize, 11usize);
    for radius in 1..=3usize {
        for py in 0..h {
            for px in 0..w {
                let mut data = vec![0.0f32; w * h];
                data[py * w + px] = 1.0;
                let surface = CorrelationSurface::new(data, w, h, Better::Max).unwrap();
                let peak = surface.extremum().unwrap();
                assert_eq!((peak.x, peak.y), (px, py));
                let near_edge =
                    px < radius || py < radius || px + radius >= w || py + radius >= h;
                for method in [
                    SubpixelMethod::CenterOfMass,
                    SubpixelMethod::EdgeWeighted { max_scaler: 0.2 },
                    SubpixelMethod::Parabolic,
                ] {
                    let refined = refine_extremum(&surface, peak, radius, method);
                    assert_eq!(
                        refined.is_none(),
                        near_edge,
                        "radius {radius} peak ({px}, {py}) {method:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn minimizing_surfaces_pick_the_smallest_score() {
    let surface =
        CorrelationSurface::new(vec![0.5, 0.1, 0.7, 0.3], 2, 2, Better::Min).unwrap();
    let best = surface.extremum().unwrap();
    assert_eq!((best.x, best.y), (1, 0));
}
