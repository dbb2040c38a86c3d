//! Scores comparing the saliency a model assigns to an odd-one-out target
//! against the saliency of its distractors or of the background.

use log::debug;

use crate::error::{Error, Result};
use crate::image::{LumaImage, TieBreak};
use crate::morphology::dilate;
use crate::source::{load_aligned, MapSource};

/// Returned when a score's denominator is zero.
pub const SENTINEL: f64 = -1.;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreOptions {
    /// Disk radius, in pixels, by which target and distractor masks grow
    /// before scoring. 0 disables dilation. Dilated masks are truncated to
    /// whole 8-bit levels first, so fractional mask values lose their
    /// fraction.
    pub dilate: usize,
    pub tie_break: TieBreak,
}

fn masked_sum(xs: &[f64], mask: &[f64]) -> f64 {
    xs.iter().zip(mask).map(|(x, &m)| x * m).sum()
}

fn masked_max(xs: &[f64], mask: &[f64]) -> f64 {
    xs.iter()
        .zip(mask)
        .map(|(x, &m)| x * m)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Complement of the union of two normalized masks, each thresholded at 0.5.
pub fn background_mask(target: &LumaImage<f64>, distractor: &LumaImage<f64>) -> LumaImage<f64> {
    target.zip_map(distractor, |t, d| if t > 0.5 || d > 0.5 { 0. } else { 1. })
}

/// Global Saliency Index, `(R_t - R_d) / (R_t + R_d)`, where `R_t` and `R_d`
/// are the mask-weighted mean saliencies of the target and the distractors.
///
/// Lies in `[-1, 1]`; positive when the target is more salient on average.
/// Returns [`SENTINEL`] when `R_t + R_d` is not positive or when both masks
/// are empty. A single empty mask is an [`Error::EmptyMask`].
pub fn global_saliency_index(
    salmap: &MapSource,
    targmap: &MapSource,
    distmap: &MapSource,
    tie_break: TieBreak,
) -> Result<f64> {
    let (mut salmap, [targmap, distmap]) = load_aligned(
        salmap,
        [("target mask", targmap), ("distractor mask", distmap)],
    )?;
    tie_break.apply(&mut salmap);

    let targmap = targmap.normalized();
    let distmap = distmap.normalized();
    let (targ_area, dist_area) = (targmap.sum(), distmap.sum());

    match (targ_area > 0., dist_area > 0.) {
        (false, false) => {
            debug!("gsi: target and distractor masks are both empty");
            return Ok(SENTINEL);
        }
        (false, true) => return Err(Error::EmptyMask { name: "target mask" }),
        (true, false) => return Err(Error::EmptyMask { name: "distractor mask" }),
        (true, true) => {}
    }

    let r_target = masked_sum(salmap.pixels(), targmap.pixels()) / targ_area;
    let r_distractor = masked_sum(salmap.pixels(), distmap.pixels()) / dist_area;
    debug!("gsi: R_target {} R_distractor {}", r_target, r_distractor);

    if r_target + r_distractor > 0. {
        Ok((r_target - r_distractor) / (r_target + r_distractor))
    } else {
        Ok(SENTINEL)
    }
}

fn to_u8_level(value: f64) -> f64 {
    value.clamp(0., 255.).trunc()
}

struct NormalizedMaps {
    salmap: LumaImage<f64>,
    targmap: LumaImage<f64>,
    distmap: LumaImage<f64>,
}

fn prepare(
    salmap: &MapSource,
    targmap: &MapSource,
    distmap: &MapSource,
    options: &ScoreOptions,
) -> Result<NormalizedMaps> {
    let (mut salmap, [mut targmap, mut distmap]) = load_aligned(
        salmap,
        [("target mask", targmap), ("distractor mask", distmap)],
    )?;
    options.tie_break.apply(&mut salmap);

    // grow the masks to allow for saliency bleed
    if options.dilate > 0 {
        targmap = dilate(&targmap.map(to_u8_level), options.dilate);
        distmap = dilate(&distmap.map(to_u8_level), options.dilate);
    }

    Ok(NormalizedMaps {
        salmap: salmap.normalized(),
        targmap: targmap.normalized(),
        distmap: distmap.normalized(),
    })
}

/// Peak target saliency divided by peak distractor saliency, on saliency
/// normalized to `[0, 1]`. Values above 1 mean the target's peak beats every
/// distractor's. Returns [`SENTINEL`] when the distractor peak is zero.
pub fn max_saliency_ratio_target(
    salmap: &MapSource,
    targmap: &MapSource,
    distmap: &MapSource,
    options: &ScoreOptions,
) -> Result<f64> {
    let maps = prepare(salmap, targmap, distmap, options)?;
    let max_target = masked_max(maps.salmap.pixels(), maps.targmap.pixels());
    let max_distractor = masked_max(maps.salmap.pixels(), maps.distmap.pixels());
    debug!("msr_targ: max target {} max distractor {}", max_target, max_distractor);

    if max_distractor > 0. {
        Ok(max_target / max_distractor)
    } else {
        Ok(SENTINEL)
    }
}

/// Peak background saliency divided by peak target saliency. The background
/// is everything outside the (dilated) target and distractor masks. Values
/// below 1 mean the target's peak beats the whole background. Returns
/// [`SENTINEL`] when the target peak is zero.
pub fn max_saliency_ratio_background(
    salmap: &MapSource,
    targmap: &MapSource,
    distmap: &MapSource,
    options: &ScoreOptions,
) -> Result<f64> {
    let maps = prepare(salmap, targmap, distmap, options)?;
    let bgmap = background_mask(&maps.targmap, &maps.distmap);
    let max_target = masked_max(maps.salmap.pixels(), maps.targmap.pixels());
    let max_background = masked_max(maps.salmap.pixels(), bgmap.pixels());
    debug!("msr_bg: max target {} max background {}", max_target, max_background);

    if max_target > 0. {
        Ok(max_background / max_target)
    } else {
        Ok(SENTINEL)
    }
}
