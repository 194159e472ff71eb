pub mod render;
pub mod text;

pub use ab_glyph::FontVec;
pub use render::{FrameStats, Screen, SkiaRenderer, decode_background, fit_within};
pub use text::{load_font, render_text_pixmap};
