use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use colored::Colorize;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use log::info;

use crate::error::{Error, Result};
use crate::gif::GifWriter;
use crate::image::{Image, LumaImage};
use crate::search::{FrameRenderer, SearchFrame};

const MARKER: Rgb<u8> = Rgb([255, 0, 0]);

/// Largest panel no wider than `max_width` that keeps the map's aspect ratio.
fn panel_size(map_width: usize, map_height: usize, max_width: u32) -> (u32, u32) {
    let (w, h) = (map_width.max(1) as f64, map_height.max(1) as f64);
    let scale = (max_width as f64 / w).min(1.);
    (
        ((w * scale).round() as u32).max(1),
        ((h * scale).round() as u32).max(1),
    )
}

fn gray_panel(img: GrayImage, width: u32, height: u32) -> RgbImage {
    let resized = imageops::resize(&img, width, height, FilterType::Nearest);
    DynamicImage::ImageLuma8(resized).to_rgb8()
}

fn draw_marker(panel: &mut RgbImage, x: u32, y: u32) {
    let arm = (panel.width().min(panel.height()) / 40).max(1) as i64;
    let (w, h) = (panel.width() as i64, panel.height() as i64);
    let (x, y) = (x as i64, y as i64);
    for d in -arm..=arm {
        for (px, py) in [(x + d, y), (x, y + d)] {
            if px >= 0 && py >= 0 && px < w && py < h {
                panel.put_pixel(px as u32, py as u32, MARKER);
            }
        }
    }
}

/// Side-by-side panels: the image with a marker on the fixation, the working
/// search map cubed for contrast, and the target mask.
pub fn compose_frame(image: &RgbImage, frame: &SearchFrame<'_>, width: u32, height: u32) -> RgbImage {
    let (map_width, map_height) = frame.search_map.get_dimensions();

    let mut photo = imageops::resize(image, width, height, FilterType::Nearest);
    let marker_x = frame.fixation.x as f64 * width as f64 / map_width as f64;
    let marker_y = frame.fixation.y as f64 * height as f64 / map_height as f64;
    draw_marker(&mut photo, marker_x as u32, marker_y as u32);

    let contrast = frame.search_map.map(|p| p.powi(3));
    let search = gray_panel(contrast.to_display(), width, height);
    let target = gray_panel(frame.target_map.to_display(), width, height);

    let mut strip = RgbImage::new(width * 3, height);
    imageops::replace(&mut strip, &photo, 0, 0);
    imageops::replace(&mut strip, &search, width as i64, 0);
    imageops::replace(&mut strip, &target, 2 * width as i64, 0);
    strip
}

/// Stand-in for the stimulus image when none is given: the saliency map
/// itself.
pub fn backdrop(image: Option<&DynamicImage>, salmap: &LumaImage<f64>) -> RgbImage {
    match image {
        Some(img) => img.to_rgb8(),
        None => DynamicImage::ImageLuma8(GrayImage::from(salmap)).to_rgb8(),
    }
}

/// Plays the search in the terminal as truecolor block characters.
pub struct TerminalRenderer {
    image: RgbImage,
    columns: u32,
    pause: Duration,
    hold: Duration,
}

impl TerminalRenderer {
    /// `columns` is the width of each panel in characters.
    pub fn new(image: RgbImage, columns: u32, pause: Duration, hold: Duration) -> Self {
        TerminalRenderer {
            image,
            columns: columns.max(1),
            pause,
            hold,
        }
    }
}

pub fn rgb_to_terminal_color_string(img: &RgbImage) -> String {
    let n_cols = img.width() as usize;
    let colored_strings: Vec<String> = img
        .pixels()
        .map(|Rgb([r, g, b])| format!("{}", "█".truecolor(*r, *g, *b)))
        .collect();

    colored_strings
        .chunks(n_cols.max(1))
        .map(|row| row.join(""))
        .collect::<Vec<String>>()
        .join("\n")
}

impl FrameRenderer for TerminalRenderer {
    fn render(&mut self, frame: &SearchFrame<'_>) -> Result<()> {
        let (map_width, map_height) = frame.search_map.get_dimensions();
        let (width, height) = panel_size(map_width, map_height, self.columns);
        // terminal cells are roughly twice as tall as they are wide
        let strip = compose_frame(&self.image, frame, width, (height / 2).max(1));

        let mut out = std::io::stdout().lock();
        writeln!(out, "{}[2J", 27 as char)?;
        writeln!(out, "{:<w$}{:<w$}{}", "Image", format!("Search Map (fixations: {})", frame.tries), "Target Map", w = width as usize)?;
        writeln!(out, "{}", rgb_to_terminal_color_string(&strip))?;
        out.flush()?;
        sleep(self.pause);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        sleep(self.hold);
        Ok(())
    }
}

/// Records the search as an animated GIF, encoding each frame as it comes.
pub struct GifRenderer {
    image: RgbImage,
    path: PathBuf,
    max_panel_width: u32,
    writer: Option<GifWriter<BufWriter<File>>>,
    frames: usize,
}

impl GifRenderer {
    /// Creates the file at `path` right away.
    pub fn new(image: RgbImage, path: &Path, max_panel_width: u32, fps: f64) -> Result<Self> {
        Ok(GifRenderer {
            image,
            path: path.to_path_buf(),
            max_panel_width: max_panel_width.max(1),
            writer: Some(GifWriter::create(path, fps)?),
            frames: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }
}

impl FrameRenderer for GifRenderer {
    fn render(&mut self, frame: &SearchFrame<'_>) -> Result<()> {
        let (map_width, map_height) = frame.search_map.get_dimensions();
        let (width, height) = panel_size(map_width, map_height, self.max_panel_width);
        let strip = compose_frame(&self.image, frame, width, height);
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::InvalidArgument(format!("{:?} is already finished", self.path)))?;
        writer.push(strip)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish();
            info!("wrote {} frames to {:?}", self.frames, self.path);
        }
        Ok(())
    }
}
