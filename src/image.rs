use std::path::Path;

use ::image::{DynamicImage, GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Upper end of the uniform noise used to break saliency ties.
pub const TIE_BREAK_EPS: f64 = 1. / 100000.;

/// Whether, and how, to perturb a saliency map with tiny positive noise so
/// that equal pixels stop tying.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TieBreak {
    #[default]
    Off,
    /// Noise from an OS-seeded generator.
    Random,
    /// Reproducible noise.
    Seeded(u64),
}

impl TieBreak {
    pub fn from_flags(add_eps: bool, seed: Option<u64>) -> Self {
        match (add_eps, seed) {
            (false, _) => TieBreak::Off,
            (true, None) => TieBreak::Random,
            (true, Some(seed)) => TieBreak::Seeded(seed),
        }
    }

    pub fn apply(&self, img: &mut LumaImage<f64>) {
        match *self {
            TieBreak::Off => {}
            TieBreak::Random => img.perturb(&mut StdRng::from_os_rng()),
            TieBreak::Seeded(seed) => img.perturb(&mut StdRng::seed_from_u64(seed)),
        }
    }
}

pub trait Image<T> {
    fn get_width(&self) -> usize;
    fn get_height(&self) -> usize;
    fn get_pixel(&self, x: usize, y: usize) -> T;
    fn set_pixel(&mut self, x: usize, y: usize, pixel: T);

    fn get_dimensions(&self) -> (usize, usize) {
        (self.get_width(), self.get_height())
    }
}

/// Row-major single-channel image. `x` indexes columns, `y` indexes rows.
#[derive(Clone, Debug, PartialEq)]
pub struct LumaImage<T> {
    width: usize,
    height: usize,
    pixels: Vec<T>,
}

impl<T: Copy> Image<T> for LumaImage<T> {
    fn get_width(&self) -> usize {
        self.width
    }

    fn get_height(&self) -> usize {
        self.height
    }

    fn get_pixel(&self, x: usize, y: usize) -> T {
        self.pixels[self.width * y + x]
    }

    fn set_pixel(&mut self, x: usize, y: usize, pixel: T) {
        self.pixels[self.width * y + x] = pixel;
    }
}

impl<T: Copy> LumaImage<T> {
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(Error::InvalidArgument(format!(
                "expected {} pixels for a {}x{} image, got {}",
                width * height,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(LumaImage {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        LumaImage {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    /// Builds an image from rows of equal length.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(Error::InvalidArgument(format!(
                "ragged rows: expected width {}, found a row of width {}",
                width,
                row.len()
            )));
        }
        Ok(LumaImage {
            width,
            height,
            pixels: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> LumaImage<U> {
        LumaImage {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|&p| f(p)).collect(),
        }
    }

    /// Combines two images of the same shape pixel by pixel.
    pub fn zip_map<U: Copy, V, F: Fn(T, U) -> V>(&self, other: &LumaImage<U>, f: F) -> LumaImage<V> {
        debug_assert_eq!(self.get_dimensions(), other.get_dimensions());
        LumaImage {
            width: self.width,
            height: self.height,
            pixels: self
                .pixels
                .iter()
                .zip(&other.pixels)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }
}

impl LumaImage<f64> {
    pub fn from_gray(value: &GrayImage) -> Self {
        LumaImage {
            width: value.width() as usize,
            height: value.height() as usize,
            pixels: value.pixels().map(|Luma([v])| *v as f64).collect(),
        }
    }

    /// Loads any supported raster as 8-bit grayscale, values in [0, 255].
    pub fn open_grayscale(path: &Path) -> Result<Self> {
        let img = ::image::open(path).map_err(|source| Error::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_gray(&img.to_luma8()))
    }

    /// Filled disk of value 255 on a black canvas, clipped to the canvas.
    /// A pixel belongs to the disk when its distance to the center is strictly
    /// less than `radius`.
    pub fn circle_mask(width: usize, height: usize, cx: f64, cy: f64, radius: f64) -> Self {
        let mut mask = LumaImage::filled(width, height, 0.);
        if width == 0 || height == 0 {
            return mask;
        }
        let r2 = radius * radius;
        let y_min = (cy - radius).floor().max(0.) as usize;
        let y_max = ((cy + radius).ceil().max(0.) as usize).min(height - 1);
        let x_min = (cx - radius).floor().max(0.) as usize;
        let x_max = ((cx + radius).ceil().max(0.) as usize).min(width - 1);
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let (dx, dy) = (x as f64 - cx, y as f64 - cy);
                if dx * dx + dy * dy < r2 {
                    mask.set_pixel(x, y, 255.);
                }
            }
        }
        mask
    }

    /// Divides every pixel by 255.
    pub fn normalized(&self) -> Self {
        self.map(|p| p / 255.)
    }

    pub fn sum(&self) -> f64 {
        self.pixels.iter().sum()
    }

    pub fn max(&self) -> f64 {
        self.pixels.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Location `(x, y)` and value of the maximum; ties resolve to the first
    /// pixel in row-major order.
    pub fn argmax(&self) -> Option<((usize, usize), f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in self.pixels.iter().enumerate() {
            match best {
                Some((_, v)) if p <= v => {}
                _ => best = Some((i, p)),
            }
        }
        best.map(|(i, v)| ((i % self.width, i / self.width), v))
    }

    /// Adds independent uniform noise in `[0, TIE_BREAK_EPS)` to every pixel.
    pub fn perturb<R: Rng>(&mut self, rng: &mut R) {
        for p in self.pixels.iter_mut() {
            *p += rng.random_range(0.0..TIE_BREAK_EPS);
        }
    }

    /// Rescales so the maximum maps to 255; used for display only.
    pub fn to_display(&self) -> GrayImage {
        let max = self.max();
        let scale = if max > 0. { 255. / max } else { 0. };
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.get_pixel(x as usize, y as usize) * scale;
            Luma([v.clamp(0., 255.) as u8])
        })
    }
}

impl From<&LumaImage<f64>> for GrayImage {
    fn from(value: &LumaImage<f64>) -> Self {
        GrayImage::from_fn(value.width as u32, value.height as u32, |x, y| {
            let v = value.get_pixel(x as usize, y as usize).round();
            Luma([v.clamp(0., 255.) as u8])
        })
    }
}

impl From<LumaImage<f64>> for DynamicImage {
    fn from(value: LumaImage<f64>) -> Self {
        DynamicImage::ImageLuma8(GrayImage::from(&value))
    }
}
