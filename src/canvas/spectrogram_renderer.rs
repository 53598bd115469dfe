//! Rasterize a dB spectrogram into a bare PNG image.
//!
//! Each call owns its own [`Canvas`]: it is created for the call, drawn,
//! cropped, written and dropped before `render` returns, on success and on
//! every error path. Nothing is shared between concurrent renders.

use crate::canvas::colors::db_to_rgb;
use crate::error::{Error, Result};
use crate::params::SpectrogramParameters;
use crate::types::SpectrogramMatrix;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const BACKGROUND: [u8; 3] = [255, 255, 255];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    fn union(self, other: Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Rect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// An RGB drawing surface sized `figure_size * dpi`.
///
/// Tracks the bounding box of everything drawn on it so that
/// [`Canvas::tight_crop`] depends only on the drawing calls, never on pixel
/// colours.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    content: Option<Rect>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..width as usize * height as usize {
            pixels.extend_from_slice(&BACKGROUND);
        }
        Self {
            width,
            height,
            pixels,
            content: None,
        }
    }

    pub fn for_params(params: &SpectrogramParameters) -> Option<Self> {
        let (w, h) = params.canvas_size();
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(w, h))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// The plotting area inside `pad` pixels of margin on every side.
    pub fn axes_rect(&self, pad: u32) -> Rect {
        let pad_x = pad.min(self.width / 2);
        let pad_y = pad.min(self.height / 2);
        Rect {
            x: pad_x,
            y: pad_y,
            width: self.width - 2 * pad_x,
            height: self.height - 2 * pad_y,
        }
    }

    /// Paint `matrix` into `rect` with nearest-neighbour sampling.
    ///
    /// Time runs left to right; mel band 0 is the bottom row. Colours are
    /// normalized to the matrix's own min/max.
    pub fn draw_matrix(&mut self, matrix: &SpectrogramMatrix, rect: Rect) {
        if matrix.is_empty() || rect.width == 0 || rect.height == 0 {
            return;
        }
        let (min_db, max_db) = (matrix.min(), matrix.max());
        let n_mels = matrix.n_mels as u64;
        let n_frames = matrix.n_frames as u64;

        // Column lookup is the same for every row.
        let frame_of: Vec<usize> = (0..rect.width as u64)
            .map(|px| (px * n_frames / rect.width as u64) as usize)
            .collect();

        for py in 0..rect.height {
            let band = (py as u64 * n_mels / rect.height as u64) as usize;
            let mel = matrix.n_mels - 1 - band;
            let row = matrix.row(mel);
            let y = rect.y + py;
            let start = (y as usize * self.width as usize + rect.x as usize) * 3;
            let line = &mut self.pixels[start..start + rect.width as usize * 3];
            for (px, rgb) in line.chunks_exact_mut(3).enumerate() {
                rgb.copy_from_slice(&db_to_rgb(row[frame_of[px]], min_db, max_db));
            }
        }

        self.content = Some(match self.content {
            Some(existing) => existing.union(rect),
            None => rect,
        });
    }

    /// Crop to the bounding box of drawn content. A blank canvas is returned
    /// unchanged.
    pub fn tight_crop(self) -> Canvas {
        let Some(bbox) = self.content else {
            return self;
        };
        if bbox.x == 0 && bbox.y == 0 && bbox.width == self.width && bbox.height == self.height {
            return self;
        }
        let mut pixels = Vec::with_capacity(bbox.width as usize * bbox.height as usize * 3);
        for y in bbox.y..bbox.y + bbox.height {
            let start = (y as usize * self.width as usize + bbox.x as usize) * 3;
            pixels.extend_from_slice(&self.pixels[start..start + bbox.width as usize * 3]);
        }
        Canvas {
            width: bbox.width,
            height: bbox.height,
            pixels,
            content: Some(Rect {
                x: 0,
                y: 0,
                width: bbox.width,
                height: bbox.height,
            }),
        }
    }

    /// Encode as PNG at `path`.
    ///
    /// The image is written to a hidden sibling file and renamed into place,
    /// so a failure never leaves a truncated PNG behind. Missing parent
    /// directories are created.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::render(path, e))?;
        }

        let tmp = temp_sibling(path);
        if let Err(e) = self.write_png_file(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::render(path, e));
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::render(path, e));
        }
        Ok(())
    }

    fn write_png_file(&self, path: &Path) -> std::result::Result<(), crate::error::BoxError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        PngEncoder::new(&mut writer).write_image(
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        writer.flush()?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spectrogram".to_string());
    path.with_file_name(format!(".{name}.{}-{n}.tmp", std::process::id()))
}

/// Render `matrix` to a PNG at `output` and return the written image size.
///
/// The size is read back from the file header rather than computed from
/// `figure_size * dpi`.
pub fn render(
    matrix: &SpectrogramMatrix,
    params: &SpectrogramParameters,
    output: &Path,
) -> Result<(u32, u32)> {
    if matrix.is_empty() {
        return Err(Error::render(output, "spectrogram matrix is empty"));
    }
    let mut canvas = Canvas::for_params(params).ok_or_else(|| {
        Error::render(
            output,
            format!(
                "figsize {:?} at {} dpi gives an empty canvas",
                params.figure_size, params.dpi
            ),
        )
    })?;

    // No axes, labels or margins: the plotting area is the whole canvas.
    let axes = canvas.axes_rect(0);
    canvas.draw_matrix(matrix, axes);
    let canvas = canvas.tight_crop();
    canvas.save_png(output)?;
    drop(canvas);

    let dims = read_dimensions(output)?;
    log::debug!(
        "rendered {}x{} mel spectrogram to {} ({}x{} px)",
        matrix.n_mels,
        matrix.n_frames,
        output.display(),
        dims.0,
        dims.1
    );
    Ok(dims)
}

/// Width and height from an image file's header.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path).map_err(|e| Error::render(path, e))
}
