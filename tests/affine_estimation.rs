mod common;

use common::similarity;
use subreg::lowlevel::estimate_affine_transformation;
use subreg::{Affine2, AffineProjector, ImageHandle, ImageId, OwnedImage, RegError};

const REFERENCE: ImageId = ImageId(1);
const MOVING: ImageId = ImageId(2);

fn assert_affine_close(actual: &Affine2, expected: &Affine2, tol: f64) {
    for (a, e) in actual.coefficients().iter().zip(expected.coefficients()) {
        assert!((a - e).abs() <= tol, "{actual:?} vs {expected:?}");
    }
}

/// Projector where reference pixels are ground coordinates and `map` sends
/// reference pixels to moving pixels.
fn projector(map: &Affine2, moving_extent: (usize, usize)) -> AffineProjector {
    let mut projector = AffineProjector::new();
    projector
        .insert_bounded(REFERENCE, Affine2::identity(), 300, 300)
        .unwrap();
    projector
        .insert_bounded(
            MOVING,
            map.inverse().unwrap(),
            moving_extent.0,
            moving_extent.1,
        )
        .unwrap();
    projector
}

#[test]
fn projected_window_corners_recover_the_pixel_map() {
    let map = similarity(3.0, 0.95, (12.0, -7.0));
    let projector = projector(&map, (300, 300));
    let raster = OwnedImage::filled(300, 300, 0.0).unwrap();
    let reference = ImageHandle::new(REFERENCE, &raster);
    let fitted =
        estimate_affine_transformation(&projector, reference, MOVING, (150.0, 150.0), 60, 60)
            .unwrap();
    assert_affine_close(&fitted, &map, 1e-6);
}

#[test]
fn three_surviving_probes_still_fit() {
    let map = Affine2::translation(0.0, 0.0);
    // Only the two top corners and the center land inside the moving image.
    let projector = projector(&map, (215, 160));
    let raster = OwnedImage::filled(300, 300, 0.0).unwrap();
    let reference = ImageHandle::new(REFERENCE, &raster);
    let fitted =
        estimate_affine_transformation(&projector, reference, MOVING, (150.0, 150.0), 60, 60)
            .unwrap();
    assert_affine_close(&fitted, &map, 1e-6);
}

#[test]
fn too_few_probes_are_rejected() {
    let projector = projector(&Affine2::identity(), (160, 160));
    let raster = OwnedImage::filled(300, 300, 0.0).unwrap();
    let reference = ImageHandle::new(REFERENCE, &raster);
    let err = estimate_affine_transformation(&projector, reference, MOVING, (150.0, 150.0), 60, 60)
        .unwrap_err();
    assert_eq!(
        err,
        RegError::InsufficientCorrespondences {
            found: 2,
            required: 3,
        }
    );
}

#[test]
fn estimation_window_must_fit_the_reference() {
    let projector = projector(&Affine2::identity(), (300, 300));
    let raster = OwnedImage::filled(300, 300, 0.0).unwrap();
    let reference = ImageHandle::new(REFERENCE, &raster);
    let err = estimate_affine_transformation(&projector, reference, MOVING, (40.0, 150.0), 60, 60)
        .unwrap_err();
    assert!(matches!(err, RegError::WindowOutOfBounds { .. }));
}
