use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

fn frame_spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    match ProgressStyle::default_spinner().template("{spinner} Frames: {pos} Time: {elapsed}") {
        Ok(style) => progress.set_style(style),
        Err(err) => warn!("invalid progress template: {}", err),
    }
    progress
}

/// Animated GIF that encodes each frame as soon as it is pushed, so memory
/// use does not grow with the length of the animation.
pub struct GifWriter<W: Write> {
    encoder: GifEncoder<W>,
    delay: Delay,
    progress: ProgressBar,
}

impl GifWriter<BufWriter<File>> {
    pub fn create(path: &Path, fps: f64) -> Result<Self> {
        let fp = BufWriter::new(File::create(path)?);
        GifWriter::new(fp, fps)
    }
}

impl<W: Write> GifWriter<W> {
    pub fn new(stream: W, fps: f64) -> Result<Self> {
        let mut encoder = GifEncoder::new(stream);
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(GifWriter {
            encoder,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1.) as u32),
            progress: frame_spinner(),
        })
    }

    pub fn push(&mut self, frame: RgbImage) -> Result<()> {
        let rgba = DynamicImage::ImageRgb8(frame).into_rgba8();
        self.encoder.encode_frame(Frame::from_parts(rgba, 0, 0, self.delay))?;
        self.progress.inc(1);
        Ok(())
    }

    /// Writes the trailer and releases the stream.
    pub fn finish(self) {
        self.progress.finish();
    }
}
