use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use ab_glyph::FontVec;
use anyhow::{Result, anyhow};
use image::imageops::FilterType;
use log::debug;
use percload_core::{AssetId, ExperimentError};
use percload_timing::Timer;
use tiny_skia::{Color, ColorU8, Paint, Pixmap, PixmapPaint, Rect, Transform};

use crate::text::render_text_pixmap;

const LETTER_SIZE_PX: f32 = 60.0;
const INSTRUCTION_SIZE_PX: f32 = 28.0;
const THANKS_SIZE_PX: f32 = 32.0;
const FIXATION_SIZE_PX: u32 = 40;
const LINE_SPACING: f32 = 1.4;

/// What should be on screen this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen<'a> {
    Instructions(&'a str),
    Fixation,
    /// Letters over their background.
    Search {
        background: &'a AssetId,
        letters: &'a str,
    },
    /// Letters have been removed; the background stays until the response.
    Background(&'a AssetId),
    Thanks(&'a str),
    Blank,
}

pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

/// Largest size with the source aspect ratio that fits inside `bounds`.
pub fn fit_within(width: u32, height: u32, bounds: (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (bounds.0.max(1), bounds.1.max(1));
    }
    let scale = (bounds.0 as f64 / width as f64).min(bounds.1 as f64 / height as f64);
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// Decodes an image file into an opaque-or-premultiplied pixmap that fits `bounds`.
pub fn decode_background(path: &Path, bounds: (u32, u32)) -> Result<Pixmap, ExperimentError> {
    let presentation = |msg: String| ExperimentError::Presentation(msg);
    let img = image::open(path)
        .map_err(|e| presentation(format!("cannot load {}: {}", path.display(), e)))?;
    let (w, h) = fit_within(img.width(), img.height(), bounds);
    let rgba = img.resize_exact(w, h, FilterType::Triangle).into_rgba8();

    let mut pm = Pixmap::new(w, h)
        .ok_or_else(|| presentation(format!("{} has no pixels", path.display())))?;
    for (dst, px) in pm.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = px.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pm)
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    font: FontVec,
    background_bounds: (u32, u32),

    fixation: Pixmap,
    backgrounds: HashMap<AssetId, Pixmap>,
    text_cache: HashMap<(String, u32), Pixmap>,

    canvas: Pixmap,
    clear_color: Color,
}

impl SkiaRenderer {
    /// `background_size` is the largest box a background may occupy; it is
    /// further clamped to the window.
    pub fn new(width: u32, height: u32, font: FontVec, background_size: (u32, u32)) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate {}x{} canvas", width, height))?;
        Ok(Self {
            width: canvas.width(),
            height: canvas.height(),
            center: (canvas.width() as f32 / 2.0, canvas.height() as f32 / 2.0),
            font,
            background_bounds: background_size,
            fixation: Self::fixation_cross()?,
            backgrounds: HashMap::new(),
            text_cache: HashMap::new(),
            canvas,
            clear_color: Color::from_rgba8(128, 128, 128, 255),
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width.max(1), new_height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate {}x{} canvas", new_width, new_height))?;
        self.width = self.canvas.width();
        self.height = self.canvas.height();
        self.center = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        // Backgrounds were fitted to the old window size.
        self.backgrounds.clear();
        Ok(())
    }

    fn fixation_cross() -> Result<Pixmap> {
        let size = FIXATION_SIZE_PX as f32;
        let mut pm = Pixmap::new(FIXATION_SIZE_PX, FIXATION_SIZE_PX)
            .ok_or_else(|| anyhow!("cannot allocate fixation cross"))?;

        let mut paint = Paint::default();
        paint.anti_alias = false;
        paint.set_color(Color::WHITE);

        let bars = [
            Rect::from_xywh(0.0, (size - 2.0) * 0.5, size, 2.0),
            Rect::from_xywh((size - 2.0) * 0.5, 0.0, 2.0, size),
        ];
        for bar in bars.into_iter().flatten() {
            pm.fill_rect(bar, &paint, Transform::identity(), None);
        }
        Ok(pm)
    }

    fn background_box(&self) -> (u32, u32) {
        (
            self.background_bounds.0.min(self.width),
            self.background_bounds.1.min(self.height),
        )
    }

    /// Decodes and caches a background so the search display can be drawn
    /// in a single frame. Already cached assets are skipped.
    pub fn load_background(&mut self, asset: &AssetId, path: &Path) -> Result<(), ExperimentError> {
        if self.backgrounds.contains_key(asset) {
            return Ok(());
        }
        let pm = decode_background(path, self.background_box())?;
        debug!("Loaded background {} ({}x{})", asset, pm.width(), pm.height());
        self.backgrounds.insert(asset.clone(), pm);
        Ok(())
    }

    /// Builds the text pixmap for a line ahead of time.
    pub fn prepare_text(&mut self, text: &str, size_px: f32) {
        let key = (text.to_string(), size_px.to_bits());
        if !self.text_cache.contains_key(&key) {
            if let Some(pm) = render_text_pixmap(text, size_px, &self.font, Color::WHITE) {
                self.text_cache.insert(key, pm);
            }
        }
    }

    pub fn prepare_letters(&mut self, letters: &str) {
        self.prepare_text(letters, LETTER_SIZE_PX);
    }

    fn blit_centered(canvas: &mut Pixmap, pm: &Pixmap, pos: (f32, f32)) {
        let x = (pos.0 - pm.width() as f32 * 0.5).round() as i32;
        let y = (pos.1 - pm.height() as f32 * 0.5).round() as i32;
        canvas.draw_pixmap(
            x,
            y,
            pm.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    fn draw_text(&mut self, text: &str, size_px: f32, pos: (f32, f32)) {
        self.prepare_text(text, size_px);
        if let Some(pm) = self.text_cache.get(&(text.to_string(), size_px.to_bits())) {
            Self::blit_centered(&mut self.canvas, pm, pos);
        }
    }

    /// Centered block of lines; blank lines keep their height.
    fn draw_paragraph(&mut self, text: &str, size_px: f32) {
        let line_height = size_px * LINE_SPACING;
        let lines: Vec<&str> = text.lines().collect();
        let top = self.center.1 - line_height * (lines.len() as f32 - 1.0) * 0.5;
        for (i, line) in lines.iter().enumerate() {
            if !line.trim().is_empty() {
                self.draw_text(line, size_px, (self.center.0, top + i as f32 * line_height));
            }
        }
    }

    fn draw_background(&mut self, asset: &AssetId) -> Result<(), ExperimentError> {
        let pm = self
            .backgrounds
            .get(asset)
            .ok_or_else(|| ExperimentError::Presentation(format!("background {asset} not loaded")))?;
        Self::blit_centered(&mut self.canvas, pm, self.center);
        Ok(())
    }

    pub fn draw_screen(&mut self, screen: Screen<'_>) -> Result<(), ExperimentError> {
        self.canvas.fill(self.clear_color);
        match screen {
            Screen::Instructions(text) => self.draw_paragraph(text, INSTRUCTION_SIZE_PX),
            Screen::Thanks(text) => self.draw_paragraph(text, THANKS_SIZE_PX),
            Screen::Fixation => {
                Self::blit_centered(&mut self.canvas, &self.fixation, self.center);
            }
            Screen::Search {
                background,
                letters,
            } => {
                self.draw_background(background)?;
                self.draw_text(letters, LETTER_SIZE_PX, self.center);
            }
            Screen::Background(background) => self.draw_background(background)?,
            Screen::Blank => {}
        }
        Ok(())
    }

    /// Draws `screen` and copies it into an RGBA8 frame buffer of the
    /// renderer's size. Frame time is recorded on `timer`.
    pub fn render_frame<T: Timer>(
        &mut self,
        screen: Screen<'_>,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats, ExperimentError> {
        let t0 = timer.now();
        self.draw_screen(screen)?;
        let draw = timer.elapsed(t0);

        let t1 = timer.now();
        let data = self.canvas.data();
        if frame_buffer.len() != data.len() {
            return Err(ExperimentError::Presentation(format!(
                "frame buffer is {} bytes, canvas is {}",
                frame_buffer.len(),
                data.len()
            )));
        }
        frame_buffer.copy_from_slice(data);
        let copy = timer.elapsed(t1);

        let total = draw + copy;
        timer.record_frame(total);
        Ok(FrameStats { draw, copy, total })
    }
}
