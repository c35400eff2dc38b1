//! Structured prompt construction.
//!
//! Turns a generation request into a single deterministic instruction string
//! plus the list of negative terms it excludes. No randomness lives here: the
//! seed travels separately with the backend request.

use crate::palette::ColorPalette;
use crate::types::{Angle, Background, ImageStyle};

/// Terms excluded from every request.
const BASE_NEGATIVES: &[&str] = &[
    "text",
    "writing",
    "letters",
    "typography",
    "watermarks",
    "signatures",
    "copyright",
    "logos",
    "brand names",
    "trademarks",
    "branding",
    "labels",
    "fingers",
    "hands",
    "holding",
    "complex background",
    "gradient background",
    "shadows on wall",
    "reflection",
];

/// Added when no border is requested.
const BORDER_NEGATIVES: &[&str] = &[
    "border",
    "frame",
    "vignette",
    "dark corners",
    "fading edges",
    "shadow margin",
    "blur edges",
    "out of frame",
    "cropped",
    "cinematic bars",
];

const BORDER_ON: &str = "ADD A CINEMATIC BORDER or VIGNETTE effect to focus the eye.";
const BORDER_OFF: &str = "IMPORTANT: FULL BLEED. ABSOLUTELY NO BORDERS, NO VIGNETTE, NO DARK CORNERS. The object must be fully visible with breathing room from the edge.";
const CLOSING_RULE: &str = "Ensure there is absolutely NO TEXT or LOGO on the object unless requested.";

/// Fixed description of one rendering style.
#[derive(Debug, Clone, Copy)]
pub struct StyleProfile {
    pub title: &'static str,
    /// Labelled description lines, e.g. `("Technique", "...")`.
    pub lines: &'static [(&'static str, &'static str)],
    pub negatives: &'static [&'static str],
}

/// Look up the profile for a style. Exhaustive over [`ImageStyle`].
pub fn style_profile(style: ImageStyle) -> StyleProfile {
    match style {
        ImageStyle::Realistic => StyleProfile {
            title: "MACRO PHOTOGRAPHY (Sony Alpha)",
            lines: &[
                ("Camera", "Sony Alpha 1, 90mm Macro G OSS lens."),
                ("Settings", "f/11 for deep depth of field, hyper-realistic, 8k texture detail."),
                ("Lighting", "Studio lighting, soft box."),
                ("Vibe", "Professional Product Photography."),
            ],
            negatives: &[
                "drawing", "painting", "illustration", "cartoon", "anime", "sketch", "vector",
                "flat", "2d",
            ],
        },
        ImageStyle::Pixar => StyleProfile {
            title: "3D ANIMATION STUDIO (Pixar-style)",
            lines: &[
                ("Technique", "High-end 3D rendering (RenderMan), subsurface scattering on materials."),
                ("Details", "Soft lighting, expressive shapes, vibrant colors, \"chunky\" but detailed textures."),
                ("Vibe", "Friendly, cute, high-budget animated movie asset."),
            ],
            negatives: &["photorealistic", "noise", "grain", "sketch", "2d", "anime"],
        },
        ImageStyle::Lego => StyleProfile {
            title: "PLASTIC BRICK CONSTRUCTION (Lego-style)",
            lines: &[
                ("Technique", "The entire object is built from realistic plastic interlocking bricks."),
                ("Details", "Visible studs, plastic material sheen, slight bevels between bricks."),
                ("Vibe", "Playful, constructed, miniature."),
            ],
            negatives: &["smooth surface", "metal", "organic", "curved continuous surface"],
        },
        ImageStyle::Ghibli => StyleProfile {
            title: "JAPANESE ANIMATION (Studio Ghibli style)",
            lines: &[
                ("Technique", "Hand-painted look, cel-shaded object with detailed line work."),
                ("Details", "Lush colors, nostalgic feel, attention to small mechanical or organic details."),
                ("Vibe", "Magical realism, traditional animation."),
            ],
            negatives: &["3d", "render", "glossy", "photorealistic", "vector"],
        },
        ImageStyle::Gta => StyleProfile {
            title: "VIDEO GAME LOADING SCREEN (GTA V Art Style)",
            lines: &[
                ("Technique", "Digital vector-painting hybrid. sharp contours, heavy black outlines."),
                ("Details", "High contrast shadows, saturated colors, comic-book realism."),
                ("Vibe", "Cool, edgy, action-game concept art."),
            ],
            negatives: &["soft", "blurry", "3d render", "pixel art"],
        },
        ImageStyle::Minecraft => StyleProfile {
            title: "VOXEL ART (Minecraft style)",
            lines: &[
                ("Technique", "Object is made entirely of large cubic blocks (voxels)."),
                ("Details", "Low-res pixel textures on 3D cubes. No curves, only 90-degree angles."),
                ("Vibe", "Blocky, gaming, 8-bit 3D."),
            ],
            negatives: &["curves", "circles", "smooth", "high res", "round"],
        },
        ImageStyle::Funko => StyleProfile {
            title: "VINYL COLLECTIBLE FIGURE (Funko Pop style)",
            lines: &[
                ("Technique", "Physical toy photography look."),
                ("Details", "Oversized head (if applicable), large black button eyes, smooth vinyl plastic texture."),
                ("Vibe", "Collectible toy, merchandise."),
            ],
            negatives: &["realistic skin", "fur", "detailed eyes", "human proportions"],
        },
        ImageStyle::Claymation => StyleProfile {
            title: "3D CLAY / PLASTICINE (Aardman/Laika style)",
            lines: &[
                ("Technique", "Stop-motion aesthetic."),
                ("Details", "Visible fingerprints in the clay, imperfect soft edges, matte finish, soft global illumination."),
                ("Vibe", "Handmade, tactile, cute."),
            ],
            negatives: &["glossy plastic", "cg", "sharp edges", "digital", "low poly"],
        },
        ImageStyle::Simpsons => StyleProfile {
            title: "AMERICAN SITCOM ANIMATION (The Simpsons style)",
            lines: &[
                ("Technique", "Flat 2D animation, yellow skin tones (if human), black outlines."),
                ("Details", "Simple geometric shapes, solid colors, no shading or gradients."),
                ("Vibe", "Cartoon, satirical, simple."),
            ],
            negatives: &["shading", "3d", "realistic", "detailed"],
        },
        ImageStyle::RetroAnime => StyleProfile {
            title: "90s RETRO ANIME (Sailor Moon / Evangelion aesthetic)",
            lines: &[
                ("Technique", "Cel animation with film grain."),
                ("Details", "Pastel highlights, slightly washed out colors, \"bloom\" lighting effect."),
                ("Vibe", "Nostalgic, lo-fi aesthetic."),
            ],
            negatives: &["hd", "4k", "sharp", "modern", "3d"],
        },
        ImageStyle::Barbie => StyleProfile {
            title: "FASHION DOLL PLASTIC (Barbie style)",
            lines: &[
                ("Technique", "Hot pink accents, glossy plastic, synthetic materials."),
                ("Details", "Idealized smooth forms, toy-like manufacturing seams."),
                ("Vibe", "Glamorous, plastic, bright."),
            ],
            negatives: &["grunge", "dark", "dirt", "matte", "rustic"],
        },
        ImageStyle::Cyberpunk => StyleProfile {
            title: "CYBERPUNK / NEON NOIR",
            lines: &[
                ("Technique", "Digital art, high contrast, neon accents (pink/blue/cyan)."),
                ("Details", "Glowing edges, futuristic materials, carbon fiber textures."),
                ("Vibe", "High-tech, dystopian."),
            ],
            negatives: &["rustic", "vintage", "organic"],
        },
        ImageStyle::Watercolor => StyleProfile {
            title: "CLEAN WATERCOLOR ILLUSTRATION",
            lines: &[
                ("Technique", "Wet-on-wet paint application, BUT contained strictly within the subject."),
                ("Details", "Soft color transitions, pigment pooling inside the object."),
                ("Vibe", "Artistic, dreamy, but CLEAN."),
                ("IMPORTANT", "NO SPLATTERS, NO DRIPS, NO MESSY PAINT OUTSIDE THE LINES. The background must remain perfectly clean."),
            ],
            negatives: &[
                "splatters", "paint drops", "messy", "spill", "dirty background", "dots", "spray",
                "3d", "render", "solid lines", "vector", "plastic", "glossy",
            ],
        },
        ImageStyle::Vector => StyleProfile {
            title: "FLAT ILLUSTRATION (Vector Art)",
            lines: &[
                ("Technique", "Adobe Illustrator style, flat design."),
                ("Details", "Clean curves, solid fill colors, no gradients (or very simple ones), no texture."),
                ("Vibe", "Minimalist, corporate art, icon design, clean."),
            ],
            negatives: &["texture", "noise", "shading", "3d", "photo", "realistic", "brush strokes"],
        },
        ImageStyle::Neon => StyleProfile {
            title: "NEON LINE ART",
            lines: &[
                ("Technique", "Glowing light tubes against a dark void."),
                ("Details", "The object is defined ONLY by glowing outlines of light (Blue/Pink/Purple)."),
                ("Vibe", "Club, nightlife, minimalist synthwave."),
            ],
            negatives: &["daylight", "solid surfaces", "matte", "texture"],
        },
        ImageStyle::ColoringBook => StyleProfile {
            title: "COLORING BOOK PAGE (Line Art)",
            lines: &[
                ("Technique", "Black and white line drawing."),
                ("Details", "Clear, continuous black outlines. NO fill, NO gray, NO shading. Pure white interior and background."),
                ("Vibe", "Educational, simple, ready to color."),
            ],
            negatives: &[
                "color", "shading", "gray", "gradient", "texture", "photo", "3d", "fill", "paint",
            ],
        },
        ImageStyle::Steampunk => StyleProfile {
            title: "STEAMPUNK (Victorian Sci-Fi)",
            lines: &[
                ("Technique", "Brass, copper, and mahogany materials."),
                ("Details", "Exposed gears, clockwork mechanisms, steam pipes, vintage leather, rivets."),
                ("Vibe", "Industrial, mechanical, vintage antique."),
            ],
            negatives: &["modern", "plastic", "digital", "clean", "minimal", "neon"],
        },
        ImageStyle::OilPainting => StyleProfile {
            title: "CLASSIC OIL PAINTING (Impressionist)",
            lines: &[
                ("Technique", "Thick impasto brush strokes, textured canvas look."),
                ("Details", "Rich, blended colors, visible brush movement, painterly lighting."),
                ("Vibe", "Museum masterpiece, traditional art, expressive."),
            ],
            negatives: &["digital", "vector", "flat", "smooth", "3d render", "photo"],
        },
        ImageStyle::PopArt => StyleProfile {
            title: "POP ART (Warhol / Lichtenstein)",
            lines: &[
                ("Technique", "Halftone dots, bold heavy outlines."),
                ("Details", "High contrast, saturated primary colors, repetitive patterns, comic-book shading."),
                ("Vibe", "Retro 60s, advertising, bold."),
            ],
            negatives: &["realistic", "subtle", "pastel", "3d", "shading"],
        },
        ImageStyle::UkiyoE => StyleProfile {
            title: "UKIYO-E (Japanese Woodblock Print)",
            lines: &[
                ("Technique", "Traditional block printing (Hokusai style)."),
                ("Details", "Flat perspective, bold outlines, Prussian blue and indigo palette, paper texture."),
                ("Vibe", "Traditional Japanese, historical, flat."),
            ],
            negatives: &["3d", "shiny", "glossy", "realistic", "modern", "digital gradient"],
        },
    }
}

/// Literal background instruction. Hex values must stay exact for chroma keying.
pub fn background_instruction(background: Background) -> &'static str {
    match background {
        Background::Black => "BACKGROUND: PURE SOLID HEX #000000 (Black). The subject must be completely isolated in a black void. NO light spill or shadows on background.",
        Background::White => "BACKGROUND: PURE SOLID HEX #FFFFFF (White). The subject must be completely isolated on a white background. NO shadows on the edges of the image.",
        Background::Green => "BACKGROUND: PURE SOLID HEX #00FF00 (Green Chroma Key). IMPORTANT: The floor and background must be FLAT GREEN with NO SHADOWS, NO REFLECTIONS, and NO GRADIENTS. The object must look like it is floating on a green layer.",
    }
}

/// Output of [`ProductPrompt::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    /// Full instruction text sent to the backend.
    pub text: String,
    /// Every excluded term, base set first, in the order they appear in `text`.
    pub negatives: Vec<String>,
}

/// Builder for one generation instruction.
///
/// # Example
/// ```
/// use shotforge::{Angle, Background, ImageStyle, ProductPrompt};
///
/// let built = ProductPrompt::new("a brass pocket watch", Angle::Front)
///     .style(ImageStyle::Steampunk)
///     .background(Background::Green)
///     .build();
///
/// assert!(built.text.contains("VIEW ANGLE: Front."));
/// assert!(built.text.contains("NO GRADIENTS"));
/// assert!(built.negatives.iter().any(|n| n == "vignette"));
/// ```
#[derive(Debug, Clone)]
pub struct ProductPrompt {
    pub user_prompt: String,
    pub angle: Angle,
    pub has_reference: bool,
    pub background: Background,
    pub style: ImageStyle,
    pub editing: bool,
    pub use_border: bool,
    pub palette: Vec<String>,
}

impl ProductPrompt {
    /// Text-only request with default style (realistic), black background, no border.
    pub fn new(user_prompt: impl Into<String>, angle: Angle) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            angle,
            has_reference: false,
            background: Background::Black,
            style: ImageStyle::Realistic,
            editing: false,
            use_border: false,
            palette: Vec::new(),
        }
    }

    pub fn reference(mut self, has_reference: bool) -> Self {
        self.has_reference = has_reference;
        self
    }

    pub fn editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    pub fn background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    pub fn border(mut self, use_border: bool) -> Self {
        self.use_border = use_border;
        self
    }

    /// Constrain colors to a palette. `None` or an empty palette adds nothing.
    pub fn palette(mut self, palette: Option<&ColorPalette>) -> Self {
        self.palette = palette.map(|p| p.colors.clone()).unwrap_or_default();
        self
    }

    fn core_instruction(&self) -> String {
        match (self.has_reference, self.editing) {
            (true, true) => format!(
                "TASK: IMAGE EDITING & MODIFICATION.\n\
                 INPUT: Use the provided Reference Image as the primary source of truth.\n\
                 INSTRUCTION: Modify the reference image according to this request: \"{}\".\n\
                 RULES: Keep the original camera angle and composition. Modify only what is requested. Maintain the \"{}\" aesthetic.",
                self.user_prompt,
                self.style.tag()
            ),
            (true, false) => format!(
                "TASK: VISUAL ANALYSIS & RE-GENERATION.\n\
                 INPUT: Analyze the REFERENCE IMAGE features.\n\
                 ACTION: Generate a COMPLETELY NEW IMAGE of this object type in 3D space.\n\
                 VIEW ANGLE: {}.\n\
                 RULES: Maintain consistent identity with reference.",
                self.angle
            ),
            (false, _) => format!(
                "TASK: Generate a {} image of: {}.\nVIEW ANGLE: {}.",
                self.style.tag(),
                self.user_prompt,
                self.angle
            ),
        }
    }

    /// Render the instruction. Equal inputs always give byte-identical output.
    pub fn build(&self) -> BuiltPrompt {
        let profile = style_profile(self.style);

        let mut negatives: Vec<String> = BASE_NEGATIVES.iter().map(|s| s.to_string()).collect();
        if !self.use_border {
            negatives.extend(BORDER_NEGATIVES.iter().map(|s| s.to_string()));
        }
        negatives.extend(profile.negatives.iter().map(|s| s.to_string()));

        let mut style_block = format!("STYLE: {}.", profile.title);
        for (label, text) in profile.lines {
            style_block.push_str(&format!("\n   - {}: {}", label, text));
        }

        let mut rules = vec![
            style_block,
            background_instruction(self.background).to_string(),
            format!("EXCLUSIONS: {}.", negatives.join(", ")),
            if self.use_border { BORDER_ON } else { BORDER_OFF }.to_string(),
        ];
        if !self.palette.is_empty() {
            rules.push(format!(
                "COLOR PALETTE: STRICTLY USE THESE COLORS: [{}]. The object and key elements MUST adhere to this color scheme.",
                self.palette.join(", ")
            ));
        }

        let numbered = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| format!("{}. {}", i + 1, rule))
            .collect::<Vec<_>>()
            .join("\n");

        let text = format!(
            "{}\n\nSTRICT GENERATION RULES:\n{}\n\n{}",
            self.core_instruction(),
            numbered,
            CLOSING_RULE
        );

        BuiltPrompt { text, negatives }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(colors: &[&str]) -> ColorPalette {
        ColorPalette {
            id: "p".into(),
            name: "Test".into(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
            is_custom: true,
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let p = palette(&["#FF0000", "#00FF00"]);
        let a = ProductPrompt::new("a watch", Angle::Isometric)
            .style(ImageStyle::Lego)
            .background(Background::White)
            .palette(Some(&p))
            .build();
        let b = ProductPrompt::new("a watch", Angle::Isometric)
            .style(ImageStyle::Lego)
            .background(Background::White)
            .palette(Some(&p))
            .build();
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_style_has_profile() {
        for style in ImageStyle::ALL {
            let profile = style_profile(style);
            assert!(!profile.title.is_empty(), "{style} has no title");
            assert!(!profile.lines.is_empty(), "{style} has no description");
            assert!(!profile.negatives.is_empty(), "{style} has no negatives");
        }
    }

    #[test]
    fn test_green_background_is_flat() {
        for style in ImageStyle::ALL {
            let built = ProductPrompt::new("cup", Angle::Front)
                .style(style)
                .background(Background::Green)
                .build();
            assert!(built.text.contains("#00FF00"));
            assert!(built.text.contains("FLAT GREEN with NO SHADOWS, NO REFLECTIONS, and NO GRADIENTS"));
        }
    }

    #[test]
    fn test_background_hex_values() {
        assert!(background_instruction(Background::Black).contains("#000000"));
        assert!(background_instruction(Background::White).contains("#FFFFFF"));
    }

    #[test]
    fn test_border_off_adds_negatives() {
        let built = ProductPrompt::new("cup", Angle::Front).border(false).build();
        assert!(built.negatives.iter().any(|n| n == "vignette"));
        assert!(built.text.contains("FULL BLEED"));
        assert!(!built.text.contains("ADD A CINEMATIC BORDER"));
    }

    #[test]
    fn test_border_on_emits_instruction() {
        let built = ProductPrompt::new("cup", Angle::Front).border(true).build();
        assert!(!built.negatives.iter().any(|n| n == "vignette"));
        assert!(built.text.contains("4. ADD A CINEMATIC BORDER"));
        assert!(built.negatives.iter().any(|n| n == "watermarks"));
    }

    #[test]
    fn test_style_negatives_follow_base() {
        let built = ProductPrompt::new("cup", Angle::Front)
            .style(ImageStyle::Minecraft)
            .border(true)
            .build();
        assert_eq!(built.negatives.len(), BASE_NEGATIVES.len() + 5);
        assert_eq!(built.negatives.last().map(String::as_str), Some("round"));
    }

    #[test]
    fn test_core_instruction_branches() {
        let edit = ProductPrompt::new("make it red", Angle::TopDown)
            .reference(true)
            .editing(true)
            .style(ImageStyle::Pixar)
            .build();
        assert!(edit.text.starts_with("TASK: IMAGE EDITING & MODIFICATION."));
        assert!(edit.text.contains("\"make it red\""));
        assert!(edit.text.contains("Keep the original camera angle and composition"));
        assert!(edit.text.contains("\"pixar\" aesthetic"));

        let regen = ProductPrompt::new("ignored", Angle::LeftSide).reference(true).build();
        assert!(regen.text.starts_with("TASK: VISUAL ANALYSIS & RE-GENERATION."));
        assert!(regen.text.contains("VIEW ANGLE: Left Side."));
        assert!(regen.text.contains("consistent identity"));

        let fresh = ProductPrompt::new("a sneaker", Angle::RightSide).build();
        assert!(fresh.text.starts_with("TASK: Generate a realistic image of: a sneaker."));
        assert!(fresh.text.contains("VIEW ANGLE: Right Side."));
    }

    #[test]
    fn test_palette_is_additive() {
        let p = palette(&["#111111", "#222222"]);
        let built = ProductPrompt::new("cup", Angle::Front)
            .style(ImageStyle::Neon)
            .palette(Some(&p))
            .build();
        assert!(built.text.contains("5. COLOR PALETTE: STRICTLY USE THESE COLORS: [#111111, #222222]"));
        assert!(built.text.contains("STYLE: NEON LINE ART."));
    }

    #[test]
    fn test_empty_palette_adds_nothing() {
        let p = palette(&[]);
        let built = ProductPrompt::new("cup", Angle::Front).palette(Some(&p)).build();
        assert!(!built.text.contains("COLOR PALETTE"));
    }
}
