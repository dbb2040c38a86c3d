use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Shape Mismatch: {name} is {found:?} (width, height) but the saliency map is {expected:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Empty Mask: {name} has no pixels set")]
    EmptyMask { name: &'static str },

    #[error("Argument Error: {0}")]
    InvalidArgument(String),
}
