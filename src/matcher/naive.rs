//! Naive normalized-correlation matchers.

use crate::image::resample::zoom_bicubic;
use crate::image::ImageView;
use crate::kernel::match_template;
use crate::matcher::{centered_offset, Ambiguity, AutoregTemplate, MatchResult, UpsampledTemplate};
use crate::refine::refine_extremum;
use crate::util::{RegError, RegResult};

/// Correlates bicubically upsampled windows and scales the placement back.
///
/// Both windows are resampled by `cfg.upsampling` on a half-pixel-center grid,
/// so the returned offset is quantized to `1 / upsampling` pixels.
pub fn pattern_match(
    template: ImageView<'_, f32>,
    search: ImageView<'_, f32>,
    cfg: &UpsampledTemplate,
) -> RegResult<MatchResult> {
    if cfg.upsampling == 0 {
        return Err(RegError::InvalidInput("upsampling factor must be at least 1"));
    }
    if !template.all_finite() || !search.all_finite() {
        return Err(RegError::NoData);
    }
    let factor = cfg.upsampling;
    let surface = if factor == 1 {
        match_template(search, template, cfg.metric)?
    } else {
        let tpl = zoom_bicubic(template, factor)?;
        let img = zoom_bicubic(search, factor)?;
        match_template(img.view(), tpl.view(), cfg.metric)?
    };
    let best = surface
        .extremum()
        .ok_or(RegError::DegenerateWindow { reason: "no finite scores" })?;
    let f = factor as f64;
    let (dx, dy) = centered_offset(
        best.x as f64 / f,
        best.y as f64 / f,
        template.shape(),
        search.shape(),
    );
    Ok(MatchResult::matched(dx, dy, best.score as f64, Some(surface)))
}

/// Correlates at native resolution and refines the best cell from its neighborhood.
///
/// An extremum whose `(2r+1)^2` neighborhood leaves the surface yields
/// `Ambiguous(RefinementOutOfBounds)`.
pub fn pattern_match_autoreg(
    template: ImageView<'_, f32>,
    search: ImageView<'_, f32>,
    cfg: &AutoregTemplate,
) -> RegResult<MatchResult> {
    let surface = match_template(search, template, cfg.metric)?;
    let best = surface
        .extremum()
        .ok_or(RegError::DegenerateWindow { reason: "no finite scores" })?;
    let score = best.score as f64;
    match refine_extremum(&surface, best, cfg.radius, cfg.method) {
        Some((x, y)) => {
            let (dx, dy) = centered_offset(x, y, template.shape(), search.shape());
            Ok(MatchResult::matched(dx, dy, score, Some(surface)))
        }
        None => Ok(MatchResult::ambiguous(
            Ambiguity::RefinementOutOfBounds,
            score,
            Some(surface),
        )),
    }
}
