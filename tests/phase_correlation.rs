mod common;

use common::{assert_close, Texture};
use subreg::lowlevel::{iterative_phase, phase_cross_correlation, subpixel_phase};
use subreg::{Ambiguity, IterativePhase, MatchStatus, OwnedImage, RegError};

const SHIFT: (f64, f64) = (5.4, -2.7);

/// `moving(q) = reference(q + SHIFT)`.
fn pair() -> (OwnedImage, OwnedImage) {
    let texture = Texture::new(21);
    let reference = texture.render(200, 200);
    let moving = texture.render_shifted(200, 200, SHIFT);
    (reference, moving)
}

#[test]
fn fractional_window_shift_is_recovered() {
    let texture = Texture::new(4);
    let reference = texture.render_shifted(64, 64, (30.0, 40.0));
    let moving = texture.render_shifted(64, 64, (32.4, 38.3));
    let est = phase_cross_correlation(reference.view(), moving.view()).unwrap();
    assert_close(est.shift, (2.4, -1.7), 0.4);
    assert!(est.score > 0.0 && est.score <= 1.0 + 1e-9);
    assert!(est.error.is_finite());
}

#[test]
fn phase_correlation_preconditions() {
    let a = OwnedImage::from_fn(16, 16, |x, y| (x * 3 + y) as f32).unwrap();
    let b = OwnedImage::from_fn(16, 15, |x, y| (x + y) as f32).unwrap();
    assert!(matches!(
        phase_cross_correlation(a.view(), b.view()),
        Err(RegError::ShapeMismatch { .. })
    ));

    let zeros = OwnedImage::filled(16, 16, 0.0).unwrap();
    assert_eq!(
        phase_cross_correlation(a.view(), zeros.view()).err(),
        Some(RegError::DegenerateWindow {
            reason: "zero energy"
        })
    );

    let mut data = a.data().to_vec();
    data[17] = f32::NAN;
    let holed = OwnedImage::new(data, 16, 16).unwrap();
    assert_eq!(
        phase_cross_correlation(a.view(), holed.view()).err(),
        Some(RegError::NoData)
    );
}

#[test]
fn single_shot_phase_registers_a_point() {
    let (reference, moving) = pair();
    let reg = subpixel_phase(&reference, &moving, (100.0, 100.0), (100.0, 100.0), (64, 64));
    assert!(reg.is_matched(), "{:?}", reg.status);
    assert_close(reg.point.unwrap(), (100.0 - SHIFT.0, 100.0 - SHIFT.1), 0.5);
}

#[test]
fn iterative_phase_converges_from_an_offset_guess() {
    let (reference, moving) = pair();
    let reg = iterative_phase(
        &reference,
        &moving,
        (100.0, 100.0),
        (100.0, 100.0),
        &IterativePhase::default(),
    );
    assert_eq!(reg.status, MatchStatus::Matched);
    assert_close(reg.point.unwrap(), (94.6, 102.7), 0.4);
}

#[test]
fn iterative_phase_reports_divergence() {
    let (reference, moving) = pair();
    let cfg = IterativePhase {
        max_dist: 1.0,
        ..IterativePhase::default()
    };
    let reg = iterative_phase(&reference, &moving, (100.0, 100.0), (100.0, 100.0), &cfg);
    assert_eq!(reg.status, MatchStatus::Ambiguous(Ambiguity::Diverged));
    assert!(reg.point.is_none());
}

#[test]
fn iterative_phase_reports_exhaustion() {
    let (reference, moving) = pair();
    // A negative threshold can never be met.
    let cfg = IterativePhase {
        convergence_threshold: -1.0,
        ..IterativePhase::default()
    };
    let reg = iterative_phase(&reference, &moving, (100.0, 100.0), (100.0, 100.0), &cfg);
    assert_eq!(reg.status, MatchStatus::Ambiguous(Ambiguity::WindowExhausted));
}

#[test]
fn window_outside_the_raster_fails() {
    let (reference, moving) = pair();
    let reg = iterative_phase(
        &reference,
        &moving,
        (100.0, 100.0),
        (500.0, 100.0),
        &IterativePhase::default(),
    );
    assert!(matches!(
        reg.status,
        MatchStatus::FailedPrecondition(RegError::WindowOutOfBounds { .. })
    ));
}
