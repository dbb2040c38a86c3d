//! Metrics for judging whether a saliency model picks out an odd-one-out
//! target among distractors: the Global Saliency Index, two max-saliency
//! ratios, and a simulated search that counts fixations until the target is
//! hit.

pub mod error;
pub mod gif;
pub mod image;
pub mod metrics;
pub mod morphology;
pub mod render;
pub mod search;
pub mod source;

pub use error::{Error, Result};
pub use crate::image::{Image, LumaImage, TieBreak};
pub use metrics::{
    global_saliency_index, max_saliency_ratio_background, max_saliency_ratio_target, ScoreOptions,
    SENTINEL,
};
pub use search::{fixations_to_find, Fixation, FrameRenderer, SearchFrame, SearchOptions, SearchOutcome, Size};
pub use source::MapSource;
