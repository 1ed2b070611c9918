mod common;

use common::{assert_close, Texture};
use subreg::lowlevel::pattern_match;
use subreg::{
    match_template, Ambiguity, AutoregTemplate, MatchStatus, MatcherKind, Metric,
    MutualInformationMatcher, OwnedImage, PhaseMatcher, RegError, UpsampledTemplate,
    WindowMatcher,
};

const OFFSET: (f64, f64) = (3.4, -2.6);

/// 101x101 search window and a 31x31 template whose center sits at `OFFSET`
/// from the search-window center.
fn scene(seed: u64) -> (OwnedImage, OwnedImage) {
    let texture = Texture::new(seed);
    let origin = (200.0, 150.0);
    let search = texture.render_shifted(101, 101, origin);
    let corner = (origin.0 + 35.0 + OFFSET.0, origin.1 + 35.0 + OFFSET.1);
    let template = texture.render_shifted(31, 31, corner);
    (search, template)
}

#[test]
fn every_strategy_recovers_a_fractional_offset() {
    let (search, template) = scene(3);
    let cases: [(&str, f64); 5] = [
        ("template", 0.35),
        ("upsampled", 0.3),
        ("mutual_information", 0.5),
        ("phase", 0.5),
        ("iterative_phase", 0.5),
    ];
    for (name, tolerance) in cases {
        let matcher: MatcherKind = name.parse().unwrap();
        let result = matcher.match_windows(template.view(), search.view());
        assert_eq!(result.status, MatchStatus::Matched, "{name}");
        let offset = result.offset().unwrap();
        assert_close(offset, OFFSET, tolerance);
    }
}

#[test]
fn zero_mean_and_squared_difference_metrics_agree() {
    let (search, template) = scene(5);
    for metric in [Metric::CcoeffNormed, Metric::SqdiffNormed] {
        let surface = match_template(search.view(), template.view(), metric).unwrap();
        assert_eq!((surface.width(), surface.height()), (71, 71));
        let best = surface.extremum().unwrap();
        // Placement 35 + offset, rounded.
        assert_eq!((best.x, best.y), (38, 32), "{metric:?}");
    }
}

#[test]
fn upsampled_offsets_are_quantized_to_the_factor() {
    let (search, template) = scene(7);
    let cfg = UpsampledTemplate {
        upsampling: 8,
        metric: Metric::CcoeffNormed,
    };
    let result = pattern_match(template.view(), search.view(), &cfg).unwrap();
    let offset = result.offset().unwrap();
    for v in [offset.0, offset.1] {
        let steps = v * 8.0;
        assert!((steps - steps.round()).abs() < 1e-9, "{v}");
    }
    assert_close(offset, OFFSET, 0.25);
}

#[test]
fn peak_next_to_the_surface_edge_is_ambiguous() {
    let texture = Texture::new(9);
    let search = texture.render_shifted(41, 41, (10.0, 10.0));
    // Placement (1, 5): the radius-2 neighborhood leaves the surface.
    let template = texture.render_shifted(21, 21, (11.0, 15.0));
    let result = AutoregTemplate::default().match_windows(template.view(), search.view());
    assert_eq!(
        result.status,
        MatchStatus::Ambiguous(Ambiguity::RefinementOutOfBounds)
    );
    assert!(result.offset().is_none());
    assert!(result.surface.is_some());
}

#[test]
fn flat_or_missing_windows_fail_their_preconditions() {
    let (search, _) = scene(3);
    let flat = OwnedImage::filled(31, 31, 12.0).unwrap();
    let result = AutoregTemplate::default().match_windows(flat.view(), search.view());
    assert!(matches!(
        result.status,
        MatchStatus::FailedPrecondition(RegError::DegenerateWindow { .. })
    ));

    let mut data = search.data().to_vec();
    data[50 * 101 + 50] = f32::NAN;
    let holed = OwnedImage::new(data, 101, 101).unwrap();
    let (_, template) = scene(3);
    for matcher in [
        MatcherKind::Template(AutoregTemplate::default()),
        MatcherKind::MutualInformation(MutualInformationMatcher::default()),
        MatcherKind::Phase(PhaseMatcher),
    ] {
        let result = matcher.match_windows(template.view(), holed.view());
        assert_eq!(
            result.status,
            MatchStatus::FailedPrecondition(RegError::NoData),
            "{}",
            matcher.name()
        );
    }
}

#[test]
fn template_larger_than_search_is_rejected() {
    let (search, template) = scene(3);
    let result = AutoregTemplate::default().match_windows(search.view(), template.view());
    assert!(matches!(
        result.status,
        MatchStatus::FailedPrecondition(RegError::RoiOutOfBounds { .. })
    ));
}
