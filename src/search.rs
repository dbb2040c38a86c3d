//! Simulated visual search: fixate the saliency peak, and if it misses the
//! target, inhibit the neighborhood and fixate again.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::image::{Image, LumaImage, TieBreak};
use crate::morphology::dilate;
use crate::source::{load_aligned, MapSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub fn new(width: usize, height: usize) -> Self {
        Size { width, height }
    }
}

/// A fixated pixel; `x` is the column and `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fixation {
    pub x: usize,
    pub y: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// Box around each fixation that counts as a hit when it touches the
    /// target. `1x1` tests only the fixated pixel.
    pub find_box: Size,
    /// Attenuate the inhibited rectangle radially instead of zeroing it.
    pub gaussian: bool,
    /// Disk radius by which the target mask grows before the search.
    pub dilate: usize,
    /// Maximum number of fixations before giving up; 0 means no limit.
    pub max_tries: usize,
    pub tie_break: TieBreak,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            find_box: Size::new(1, 1),
            gaussian: false,
            dilate: 0,
            max_tries: 0,
            tie_break: TieBreak::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
    pub tries: usize,
    pub found: bool,
}

/// State of the search right after one fixation.
pub struct SearchFrame<'a> {
    pub fixation: Fixation,
    pub tries: usize,
    pub found: bool,
    /// Working saliency map, already inhibited around `fixation` on a miss.
    pub search_map: &'a LumaImage<f64>,
    /// Normalized target mask before any dilation.
    pub target_map: &'a LumaImage<f64>,
}

/// Observes the search one fixation at a time. Renderers cannot change the
/// outcome.
pub trait FrameRenderer {
    fn render(&mut self, frame: &SearchFrame<'_>) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Counts the fixations needed before one lands on the target.
///
/// Every iteration fixates the first maximum (row-major) of the working map.
/// A fixation whose `find_box` touches a positive target pixel ends the
/// search. Otherwise an `iorrec` rectangle centered on the fixation is
/// inhibited and the search continues. With `max_tries > 0` the search gives
/// up once `tries` exceeds it. Without a limit it gives up when it misses on
/// a fixation of zero saliency.
///
/// The saliency map is copied before it is modified.
pub fn fixations_to_find(
    salmap: &MapSource,
    targmap: &MapSource,
    iorrec: Size,
    options: &SearchOptions,
    mut renderer: Option<&mut dyn FrameRenderer>,
) -> Result<SearchOutcome> {
    if options.find_box.width == 0 || options.find_box.height == 0 {
        return Err(Error::InvalidArgument(format!(
            "find box must be at least 1x1, got {}x{}",
            options.find_box.width, options.find_box.height
        )));
    }

    let (salmap, [targmap]) = load_aligned(salmap, [("target mask", targmap)])?;
    let mut search_map = salmap.normalized();
    options.tie_break.apply(&mut search_map);

    let target_map = targmap.normalized();
    // allow near hits
    let grown = (options.dilate > 0).then(|| dilate(&target_map, options.dilate));
    let hit_map = grown.as_ref().unwrap_or(&target_map);

    let mut tries = 0;
    let mut found;
    loop {
        let ((x, y), peak) = search_map
            .argmax()
            .ok_or_else(|| Error::InvalidArgument(String::from("saliency map has no pixels")))?;
        let fixation = Fixation { x, y };
        tries += 1;

        found = hits_target(hit_map, fixation, options.find_box);
        trace!("fixation {}\t({}, {})\tpeak {}\tfound {}", tries, x, y, peak, found);

        if !found {
            inhibit(&mut search_map, fixation, iorrec, options.gaussian);
        }

        if let Some(renderer) = renderer.as_deref_mut() {
            renderer.render(&SearchFrame {
                fixation,
                tries,
                found,
                search_map: &search_map,
                target_map: &target_map,
            })?;
        }

        if found {
            break;
        }
        if options.max_tries > 0 && tries > options.max_tries {
            debug!("out of tries after {} fixations", tries);
            break;
        }
        if options.max_tries == 0 && peak <= 0. {
            debug!("saliency exhausted after {} fixations", tries);
            break;
        }
    }

    if let Some(renderer) = renderer {
        renderer.finish()?;
    }

    debug!("search finished: tries {} found {}", tries, found);
    Ok(SearchOutcome { tries, found })
}

fn hits_target(target_map: &LumaImage<f64>, fixation: Fixation, find_box: Size) -> bool {
    let (width, height) = target_map.get_dimensions();
    let x_min = fixation.x.saturating_sub((find_box.width - 1) / 2);
    let y_min = fixation.y.saturating_sub((find_box.height - 1) / 2);
    let x_max = (x_min + find_box.width).min(width);
    let y_max = (y_min + find_box.height).min(height);
    (y_min..y_max).any(|y| (x_min..x_max).any(|x| target_map.get_pixel(x, y) > 0.))
}

/// Half-open range `[center - extent / 2, center + extent / 2)`, truncated to
/// whole pixels, clipped to `[0, limit)` and widened to contain `center`.
fn inhibition_range(center: usize, extent: usize, limit: usize) -> (usize, usize) {
    let half = extent as f64 / 2.;
    let lo = (center as f64 - half).max(0.) as usize;
    let hi = ((center as f64 + half) as usize).min(limit);
    (lo, hi.max(center + 1))
}

/// Zeroes, or with `gaussian` scales by distance from the fixation relative
/// to the farthest pixel of the patch, the `iorrec` rectangle around the
/// fixation.
fn inhibit(search_map: &mut LumaImage<f64>, fixation: Fixation, iorrec: Size, gaussian: bool) {
    let (width, height) = search_map.get_dimensions();
    let (x_min, x_max) = inhibition_range(fixation.x, iorrec.width, width);
    let (y_min, y_max) = inhibition_range(fixation.y, iorrec.height, height);

    let distance = |x: usize, y: usize| {
        let dx = x as f64 - fixation.x as f64;
        let dy = y as f64 - fixation.y as f64;
        (dx * dx + dy * dy).sqrt()
    };

    let max_distance = if gaussian {
        [(x_min, y_min), (x_min, y_max - 1), (x_max - 1, y_min), (x_max - 1, y_max - 1)]
            .iter()
            .map(|&(x, y)| distance(x, y))
            .fold(0., f64::max)
    } else {
        0.
    };

    for y in y_min..y_max {
        for x in x_min..x_max {
            let weight = if max_distance > 0. {
                distance(x, y) / max_distance
            } else {
                0.
            };
            let value = search_map.get_pixel(x, y);
            search_map.set_pixel(x, y, value * weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(Fixation, usize, bool)>,
        target_sums: Vec<f64>,
        finished: bool,
    }

    impl FrameRenderer for Recorder {
        fn render(&mut self, frame: &SearchFrame<'_>) -> Result<()> {
            self.frames.push((frame.fixation, frame.tries, frame.found));
            self.target_sums.push(frame.target_map.sum());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn single_peak() -> (MapSource, MapSource) {
        let mut sal = LumaImage::filled(100, 100, 0.);
        sal.set_pixel(50, 50, 200.);
        let mut targ = LumaImage::filled(100, 100, 0.);
        targ.set_pixel(50, 50, 255.);
        (sal.into(), targ.into())
    }

    // uniform saliency with a dark target corner the search never reaches
    fn unreachable() -> (MapSource, MapSource) {
        let mut sal = LumaImage::filled(20, 20, 100.);
        sal.set_pixel(19, 19, 0.);
        let mut targ = LumaImage::filled(20, 20, 0.);
        targ.set_pixel(19, 19, 255.);
        (sal.into(), targ.into())
    }

    #[test]
    fn target_at_global_peak_is_found_first() {
        let (sal, targ) = single_peak();
        let outcome = fixations_to_find(&sal, &targ, Size::new(10, 10), &SearchOptions::default(), None).unwrap();
        assert_eq!(outcome, SearchOutcome { tries: 1, found: true });
    }

    #[test]
    fn bounded_search_gives_up_after_max_tries_plus_one() {
        let (sal, targ) = unreachable();
        let options = SearchOptions { max_tries: 5, ..Default::default() };
        let outcome = fixations_to_find(&sal, &targ, Size::new(2, 2), &options, None).unwrap();
        assert_eq!(outcome, SearchOutcome { tries: 6, found: false });
    }

    #[test]
    fn unbounded_search_stops_when_saliency_is_exhausted() {
        let sal = MapSource::from(LumaImage::filled(4, 4, 50.));
        let targ = MapSource::from(LumaImage::filled(4, 4, 0.));
        let outcome = fixations_to_find(&sal, &targ, Size::new(2, 2), &SearchOptions::default(), None).unwrap();
        assert!(!outcome.found);
        assert!(outcome.tries <= 17);
    }

    #[test]
    fn fixations_walk_down_the_peaks() {
        let sal = MapSource::from(LumaImage::from_rows(&[vec![30., 20., 10., 5.]]).unwrap());
        let targ = MapSource::from(LumaImage::from_rows(&[vec![0., 0., 255., 0.]]).unwrap());
        let mut recorder = Recorder::default();
        let outcome = fixations_to_find(
            &sal,
            &targ,
            Size::new(1, 1),
            &SearchOptions::default(),
            Some(&mut recorder),
        )
        .unwrap();
        assert_eq!(outcome, SearchOutcome { tries: 3, found: true });
        let xs: Vec<usize> = recorder.frames.iter().map(|(f, _, _)| f.x).collect();
        assert_eq!(xs, vec![0, 1, 2]);
        assert_eq!(recorder.frames.last().map(|f| f.2), Some(true));
        assert!(recorder.finished);
    }

    #[test]
    fn renderer_does_not_change_the_outcome() {
        let (sal, targ) = unreachable();
        let options = SearchOptions { max_tries: 8, gaussian: true, ..Default::default() };
        let plain = fixations_to_find(&sal, &targ, Size::new(3, 3), &options, None).unwrap();
        let mut recorder = Recorder::default();
        let observed = fixations_to_find(&sal, &targ, Size::new(3, 3), &options, Some(&mut recorder)).unwrap();
        assert_eq!(plain, observed);
        assert_eq!(recorder.frames.len(), observed.tries);
    }

    #[test]
    fn find_box_widens_the_hit_test() {
        let mut sal = LumaImage::filled(9, 9, 0.);
        sal.set_pixel(4, 4, 200.);
        sal.set_pixel(0, 0, 100.);
        let mut targ = LumaImage::filled(9, 9, 0.);
        targ.set_pixel(5, 5, 255.);
        let (sal, targ) = (MapSource::from(sal), MapSource::from(targ));

        let exact = SearchOptions { max_tries: 1, ..Default::default() };
        let outcome = fixations_to_find(&sal, &targ, Size::new(1, 1), &exact, None).unwrap();
        assert!(!outcome.found);

        let boxed = SearchOptions { find_box: Size::new(3, 3), ..exact };
        let outcome = fixations_to_find(&sal, &targ, Size::new(1, 1), &boxed, None).unwrap();
        assert_eq!(outcome, SearchOutcome { tries: 1, found: true });
    }

    #[test]
    fn dilated_target_counts_near_misses() {
        let mut sal = LumaImage::filled(9, 9, 0.);
        sal.set_pixel(4, 3, 200.);
        let mut targ = LumaImage::filled(9, 9, 0.);
        targ.set_pixel(4, 4, 255.);
        let (sal, targ) = (MapSource::from(sal), MapSource::from(targ));
        let options = SearchOptions { dilate: 1, ..Default::default() };
        let outcome = fixations_to_find(&sal, &targ, Size::new(2, 2), &options, None).unwrap();
        assert_eq!(outcome, SearchOutcome { tries: 1, found: true });
    }

    #[test]
    fn frames_show_the_undilated_target() {
        let mut sal = LumaImage::filled(9, 9, 0.);
        sal.set_pixel(4, 3, 200.);
        let mut targ = LumaImage::filled(9, 9, 0.);
        targ.set_pixel(4, 4, 255.);
        let (sal, targ) = (MapSource::from(sal), MapSource::from(targ));
        let options = SearchOptions { dilate: 2, ..Default::default() };
        let mut recorder = Recorder::default();
        let outcome = fixations_to_find(&sal, &targ, Size::new(2, 2), &options, Some(&mut recorder)).unwrap();
        assert!(outcome.found);
        assert_eq!(recorder.target_sums, vec![1.]);
    }

    // equal peaks at (2, 0) and (0, 2), target on the second
    fn two_way_tie() -> (MapSource, MapSource) {
        let mut sal = LumaImage::filled(3, 3, 0.);
        sal.set_pixel(2, 0, 100.);
        sal.set_pixel(0, 2, 100.);
        let mut targ = LumaImage::filled(3, 3, 0.);
        targ.set_pixel(0, 2, 255.);
        (sal.into(), targ.into())
    }

    #[test]
    fn ties_break_row_major_without_noise() {
        let (sal, targ) = two_way_tie();
        let mut recorder = Recorder::default();
        let options = SearchOptions::default();
        let outcome = fixations_to_find(&sal, &targ, Size::new(1, 1), &options, Some(&mut recorder)).unwrap();
        assert_eq!(outcome, SearchOutcome { tries: 2, found: true });
        let order: Vec<(usize, usize)> = recorder.frames.iter().map(|(f, _, _)| (f.x, f.y)).collect();
        assert_eq!(order, vec![(2, 0), (0, 2)]);
    }

    #[test]
    fn seeded_tie_break_is_reproducible() {
        let (sal, targ) = two_way_tie();
        let options = SearchOptions { tie_break: TieBreak::Seeded(17), ..Default::default() };
        let mut first = Recorder::default();
        let mut second = Recorder::default();
        let a = fixations_to_find(&sal, &targ, Size::new(1, 1), &options, Some(&mut first)).unwrap();
        let b = fixations_to_find(&sal, &targ, Size::new(1, 1), &options, Some(&mut second)).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.frames, second.frames);
        assert!(a.found && (a.tries == 1 || a.tries == 2));
    }

    #[test]
    fn tie_break_noise_is_added_after_normalization() {
        // 0.001 apart: below the noise once divided by 255, far above it before
        let sal = MapSource::from(LumaImage::from_rows(&[vec![100., 100.001]]).unwrap());
        let targ = MapSource::from(LumaImage::from_rows(&[vec![255., 0.]]).unwrap());
        let search = |tie_break: TieBreak| {
            let options = SearchOptions { tie_break, ..Default::default() };
            fixations_to_find(&sal, &targ, Size::new(1, 1), &options, None).unwrap()
        };
        assert_eq!(search(TieBreak::Off), SearchOutcome { tries: 2, found: true });
        assert!((0..64).any(|seed| search(TieBreak::Seeded(seed)).tries == 1));
    }

    #[test]
    fn empty_find_box_is_rejected() {
        let (sal, targ) = single_peak();
        let options = SearchOptions { find_box: Size::new(0, 1), ..Default::default() };
        assert!(matches!(
            fixations_to_find(&sal, &targ, Size::new(1, 1), &options, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn caller_map_is_untouched() {
        let img = LumaImage::filled(6, 6, 80.);
        let sal = MapSource::from(&img);
        let targ = MapSource::from(LumaImage::filled(6, 6, 0.));
        let options = SearchOptions { max_tries: 3, ..Default::default() };
        fixations_to_find(&sal, &targ, Size::new(2, 2), &options, None).unwrap();
        match sal {
            MapSource::Pixels(ref kept) => assert_eq!(kept, &img),
            MapSource::Path(_) => unreachable!(),
        }
    }

    #[test]
    fn inhibition_range_matches_truncated_half_extents() {
        assert_eq!(inhibition_range(10, 6, 100), (7, 13));
        assert_eq!(inhibition_range(10, 75, 100), (0, 47));
        assert_eq!(inhibition_range(98, 6, 100), (95, 100));
        // a one-pixel rectangle still covers the fixation
        assert_eq!(inhibition_range(0, 1, 100), (0, 1));
        assert_eq!(inhibition_range(5, 1, 100), (4, 6));
    }

    #[test]
    fn flat_inhibition_zeroes_the_rectangle() {
        let mut map = LumaImage::filled(5, 5, 1.);
        inhibit(&mut map, Fixation { x: 2, y: 2 }, Size::new(2, 2), false);
        let zeroed: Vec<(usize, usize)> = (0..5)
            .flat_map(|y| (0..5).map(move |x| (x, y)))
            .filter(|&(x, y)| map.get_pixel(x, y) == 0.)
            .collect();
        assert_eq!(zeroed, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn gaussian_inhibition_decays_toward_the_fixation() {
        let mut map = LumaImage::filled(5, 5, 1.);
        inhibit(&mut map, Fixation { x: 2, y: 2 }, Size::new(4, 4), true);
        assert_eq!(map.get_pixel(2, 2), 0.);
        assert!((map.get_pixel(0, 0) - 1.).abs() < 1e-12);
        let near = map.get_pixel(1, 2);
        assert!(near > 0. && near < 1.);
        // outside the patch
        assert_eq!(map.get_pixel(4, 4), 1.);
    }

    #[test]
    fn gaussian_inhibition_of_a_single_pixel_zeroes_it() {
        let mut map = LumaImage::filled(3, 3, 1.);
        inhibit(&mut map, Fixation { x: 0, y: 0 }, Size::new(1, 1), true);
        assert_eq!(map.get_pixel(0, 0), 0.);
        assert_eq!(map.sum(), 8.);
    }
}
