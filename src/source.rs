use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::image::{Image, LumaImage};

/// A saliency map or mask, either on disk or already decoded. Pixel values
/// are raw intensities in `[0, 255]`.
#[derive(Clone, Debug)]
pub enum MapSource {
    Path(PathBuf),
    Pixels(LumaImage<f64>),
}

impl MapSource {
    /// Produces an owned grayscale copy. Paths are decoded fresh on every call
    /// and in-memory maps are cloned, so callers never observe mutations made
    /// by an operation.
    pub fn load(&self) -> Result<LumaImage<f64>> {
        match self {
            MapSource::Path(path) => {
                debug!("loading {:?}", path);
                LumaImage::open_grayscale(path)
            }
            MapSource::Pixels(img) => Ok(img.clone()),
        }
    }
}

impl From<PathBuf> for MapSource {
    fn from(value: PathBuf) -> Self {
        MapSource::Path(value)
    }
}

impl From<&Path> for MapSource {
    fn from(value: &Path) -> Self {
        MapSource::Path(value.to_path_buf())
    }
}

impl From<&str> for MapSource {
    fn from(value: &str) -> Self {
        MapSource::Path(PathBuf::from(value))
    }
}

impl From<LumaImage<f64>> for MapSource {
    fn from(value: LumaImage<f64>) -> Self {
        MapSource::Pixels(value)
    }
}

impl From<&LumaImage<f64>> for MapSource {
    fn from(value: &LumaImage<f64>) -> Self {
        MapSource::Pixels(value.clone())
    }
}

/// Rejects `img` unless it has the saliency map's `(width, height)`.
pub fn check_shape(name: &'static str, expected: (usize, usize), img: &LumaImage<f64>) -> Result<()> {
    let found = img.get_dimensions();
    if found != expected {
        return Err(Error::ShapeMismatch {
            name,
            expected,
            found,
        });
    }
    Ok(())
}

/// Loads a saliency map and any number of named masks, checking that every
/// mask matches the saliency map's shape.
pub fn load_aligned<const N: usize>(
    salmap: &MapSource,
    masks: [(&'static str, &MapSource); N],
) -> Result<(LumaImage<f64>, [LumaImage<f64>; N])> {
    let salmap = salmap.load()?;
    let shape = salmap.get_dimensions();
    let mut loaded = Vec::with_capacity(N);
    for (name, source) in masks {
        let mask = source.load()?;
        check_shape(name, shape, &mask)?;
        loaded.push(mask);
    }
    let loaded: [LumaImage<f64>; N] = loaded
        .try_into()
        .map_err(|_| Error::InvalidArgument(String::from("mask count changed while loading")))?;
    Ok((salmap, loaded))
}
