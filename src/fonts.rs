//! Font metrics and text measurement using `ttf-parser`.
//!
//! Without loaded font files the manager falls back to Helvetica-like
//! synthetic metrics, which is what the builtin PDF fonts use anyway.

use std::collections::HashMap;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
            italic,
        }
    }
}

/// Manages loaded fonts.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    default_key: FontKey,
}

impl FontManager {
    pub fn new() -> Self {
        let default_key = FontKey::new("Helvetica", false, false);
        let mut fonts = HashMap::new();
        for bold in [false, true] {
            fonts.insert(
                FontKey::new("Helvetica", bold, false),
                FontData {
                    bytes: Vec::new(),
                    units_per_em: 1000.0,
                    ascender: 750.0,
                    descender: -250.0,
                },
            );
        }
        Self { fonts, default_key }
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let face =
            ttf_parser::Face::parse(&bytes, 0).map_err(|e| format!("Failed to parse font: {e}"))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        self.fonts.insert(FontKey::new(family, bold, italic), data);
        Ok(())
    }

    /// Get font data for a key, falling back to the default face.
    pub fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts
            .get(key)
            .or_else(|| self.fonts.get(&self.default_key))
    }

    /// Width of `text` in px at `font_size`.
    ///
    /// Real font bytes are measured glyph by glyph; the synthetic default
    /// uses an average advance of 0.5 em (0.55 em for bold).
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: &FontKey) -> f32 {
        let heuristic = |n: usize| {
            let avg = if key.bold { 0.55 } else { 0.5 };
            n as f32 * font_size * avg
        };
        let Some(data) = self.get(key).filter(|d| !d.bytes.is_empty()) else {
            return heuristic(text.chars().count());
        };
        let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) else {
            return heuristic(text.chars().count());
        };
        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| match face.glyph_index(ch) {
                Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => font_size * 0.5,
            })
            .sum()
    }

    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    pub fn ascender_px(&self, font_size: f32, key: &FontKey) -> f32 {
        match self.get(key) {
            Some(data) => data.ascender * font_size / data.units_per_em,
            None => font_size * 0.75,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-wrap text to fit within `max_width` pixels.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    key: &FontKey,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fonts.measure_text_width(&candidate, font_size, key) > max_width
                && !current.is_empty()
            {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}
