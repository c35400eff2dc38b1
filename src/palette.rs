use std::collections::HashMap;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::types::GenerationConfig;

/// Side length of the thumbnail colors are sampled from.
const SAMPLE_SIZE: u32 = 100;
/// Every n-th pixel of the thumbnail is counted.
const SAMPLE_STRIDE: usize = 10;
const MAX_COLORS: usize = 5;

/// A named, ordered set of hex colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub id: String,
    pub name: String,
    pub colors: Vec<String>,
    #[serde(default)]
    pub is_custom: bool,
}

impl ColorPalette {
    fn builtin(id: &str, name: &str, colors: [&str; 4]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
            is_custom: false,
        }
    }
}

/// The ten built-in palettes, in display order.
pub fn default_palettes() -> Vec<ColorPalette> {
    vec![
        ColorPalette::builtin("wc-1", "Pastel Dream", ["#FFB7B2", "#E2F0CB", "#B5EAD7", "#C7CEEA"]),
        ColorPalette::builtin("wc-2", "Ocean Mist", ["#A0E7E5", "#B4F8C8", "#FBE7C6", "#FFAEBC"]),
        ColorPalette::builtin("wc-3", "Sunset Wash", ["#FF9AA2", "#FFB7B2", "#FFDAC1", "#E2F0CB"]),
        ColorPalette::builtin("wc-4", "Earthy Clay", ["#D7A86E", "#A47551", "#754C29", "#523A28"]),
        ColorPalette::builtin("wc-5", "Cool Blues", ["#BFD7ED", "#60A3D9", "#0074B7", "#003B73"]),
        ColorPalette::builtin("wc-6", "Neon Pop", ["#FF00FF", "#00FFFF", "#FFFF00", "#000000"]),
        ColorPalette::builtin("wc-7", "Vintage", ["#CB997E", "#DDBEA9", "#FFE8D6", "#B7B7A4"]),
        ColorPalette::builtin("wc-8", "Forest", ["#2D6A4F", "#40916C", "#52B788", "#74C69D"]),
        ColorPalette::builtin("wc-9", "Lavender", ["#E0BBE4", "#957DAD", "#D291BC", "#FEC8D8"]),
        ColorPalette::builtin("wc-10", "Citrus", ["#F94144", "#F3722C", "#F8961E", "#F9C74F"]),
    ]
}

/// Dominant colors of an encoded image (PNG, JPEG or WebP).
///
/// The image is scaled to 100x100 and every 10th pixel is counted. Returns
/// up to five `#RRGGBB` strings, most frequent first; ties keep the order in
/// which the colors were first seen.
pub fn extract_palette(bytes: &[u8]) -> Result<Vec<String>> {
    let thumb = image::load_from_memory(bytes)?
        .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (seen, pixel) in thumb.pixels().step_by(SAMPLE_STRIDE).enumerate() {
        let hex = format!("#{:02X}{:02X}{:02X}", pixel[0], pixel[1], pixel[2]);
        counts.entry(hex).or_insert((0, seen)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
        count_b.cmp(count_a).then(first_a.cmp(first_b))
    });

    Ok(ranked
        .into_iter()
        .take(MAX_COLORS)
        .map(|(hex, _)| hex)
        .collect())
}

/// Built-in palettes plus user-created ones.
#[derive(Debug, Clone, Default)]
pub struct PaletteBook {
    custom: Vec<ColorPalette>,
}

impl PaletteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore previously saved custom palettes.
    pub fn with_custom(custom: Vec<ColorPalette>) -> Self {
        Self { custom }
    }

    /// Built-ins followed by custom palettes.
    pub fn all(&self) -> Vec<ColorPalette> {
        let mut all = default_palettes();
        all.extend(self.custom.iter().cloned());
        all
    }

    pub fn custom(&self) -> &[ColorPalette] {
        &self.custom
    }

    pub fn get(&self, id: &str) -> Option<ColorPalette> {
        self.all().into_iter().find(|p| p.id == id)
    }

    /// Extract a palette from image bytes and append it as
    /// "Custom Palette N".
    pub fn add_from_image(&mut self, bytes: &[u8]) -> Result<ColorPalette> {
        let colors = extract_palette(bytes)?;
        let palette = ColorPalette {
            id: format!("custom-{}", uuid::Uuid::new_v4()),
            name: format!("Custom Palette {}", self.custom.len() + 1),
            colors,
            is_custom: true,
        };
        self.custom.push(palette.clone());
        Ok(palette)
    }

    /// Remove a custom palette. Clears `config.selected_palette_id` if it
    /// pointed at the removed entry. Built-ins cannot be removed.
    pub fn delete(&mut self, id: &str, config: &mut GenerationConfig) -> Result<ColorPalette> {
        let pos = self
            .custom
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StudioError::PaletteNotFound(id.to_string()))?;
        let removed = self.custom.remove(pos);
        if config.selected_palette_id.as_deref() == Some(id) {
            config.selected_palette_id = None;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, paint: impl Fn(u32, u32) -> Rgb<u8>) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, paint);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_ten_builtins() {
        let palettes = default_palettes();
        assert_eq!(palettes.len(), 10);
        assert_eq!(palettes[0].name, "Pastel Dream");
        assert_eq!(palettes[9].id, "wc-10");
        assert!(palettes.iter().all(|p| !p.is_custom && p.colors.len() == 4));
    }

    #[test]
    fn test_extract_solid_color() {
        let bytes = png(50, 50, |_, _| Rgb([255, 0, 0]));
        assert_eq!(extract_palette(&bytes).unwrap(), vec!["#FF0000"]);
    }

    #[test]
    fn test_extract_ranks_by_frequency() {
        // Left 3/4 blue, right 1/4 white.
        let bytes = png(100, 100, |x, _| {
            if x < 75 {
                Rgb([0, 0, 255])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let colors = extract_palette(&bytes).unwrap();
        assert_eq!(colors[0], "#0000FF");
        assert!(colors.contains(&"#FFFFFF".to_string()));
        assert!(colors.len() <= 5);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        assert!(matches!(extract_palette(b"not an image"), Err(StudioError::Image(_))));
    }

    #[test]
    fn test_add_and_delete_custom() {
        let mut book = PaletteBook::new();
        let bytes = png(10, 10, |_, _| Rgb([1, 2, 3]));
        let first = book.add_from_image(&bytes).unwrap();
        let second = book.add_from_image(&bytes).unwrap();
        assert_eq!(first.name, "Custom Palette 1");
        assert_eq!(second.name, "Custom Palette 2");
        assert!(first.id.starts_with("custom-"));
        assert_eq!(book.all().len(), 12);

        let mut config = GenerationConfig {
            selected_palette_id: Some(first.id.clone()),
            ..Default::default()
        };
        book.delete(&second.id, &mut config).unwrap();
        assert_eq!(config.selected_palette_id.as_deref(), Some(first.id.as_str()));

        book.delete(&first.id, &mut config).unwrap();
        assert!(config.selected_palette_id.is_none());
        assert!(book.custom().is_empty());
    }

    #[test]
    fn test_builtin_cannot_be_deleted() {
        let mut book = PaletteBook::new();
        let mut config = GenerationConfig::default();
        assert!(matches!(
            book.delete("wc-1", &mut config),
            Err(StudioError::PaletteNotFound(_))
        ));
        assert!(book.get("wc-1").is_some());
    }
}
