use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote image model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ImageModel {
    #[default]
    #[serde(rename = "gemini-2.5-flash-image")]
    Flash,
    #[serde(rename = "gemini-3-pro-image-preview")]
    Pro,
}

impl ImageModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageModel::Flash => "gemini-2.5-flash-image",
            ImageModel::Pro => "gemini-3-pro-image-preview",
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    FourThirds,
    #[serde(rename = "3:4")]
    ThreeFourths,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::FourThirds => "4:3",
            AspectRatio::ThreeFourths => "3:4",
        }
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1k")]
    OneK,
    #[serde(rename = "2k")]
    TwoK,
    #[serde(rename = "4k")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1k",
            Resolution::TwoK => "2k",
            Resolution::FourK => "4k",
        }
    }

    /// Image size hint sent to the backend. `None` for the standard tier.
    pub fn image_size(&self) -> Option<&'static str> {
        match self {
            Resolution::OneK => None,
            Resolution::TwoK => Some("2K"),
            Resolution::FourK => Some("4K"),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solid background behind the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Background {
    #[default]
    Black,
    White,
    /// Chroma key green, later converted to transparency.
    Green,
}

/// Camera viewpoint, in the order angles are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Angle {
    #[serde(rename = "Front")]
    Front,
    #[serde(rename = "Left Side")]
    LeftSide,
    #[serde(rename = "Right Side")]
    RightSide,
    #[serde(rename = "Top-down")]
    TopDown,
    #[serde(rename = "Isometric")]
    Isometric,
}

impl Angle {
    pub const ALL: [Angle; 5] = [
        Angle::Front,
        Angle::LeftSide,
        Angle::RightSide,
        Angle::TopDown,
        Angle::Isometric,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Angle::Front => "Front",
            Angle::LeftSide => "Left Side",
            Angle::RightSide => "Right Side",
            Angle::TopDown => "Top-down",
            Angle::Isometric => "Isometric",
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rendering style. Unknown tags resolve to [`ImageStyle::Realistic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageStyle {
    #[default]
    Realistic,
    Pixar,
    Lego,
    Ghibli,
    Gta,
    Minecraft,
    Funko,
    Claymation,
    Simpsons,
    RetroAnime,
    Barbie,
    Cyberpunk,
    Watercolor,
    Vector,
    Neon,
    ColoringBook,
    Steampunk,
    OilPainting,
    PopArt,
    UkiyoE,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 20] = [
        ImageStyle::Realistic,
        ImageStyle::Pixar,
        ImageStyle::Lego,
        ImageStyle::Ghibli,
        ImageStyle::Gta,
        ImageStyle::Minecraft,
        ImageStyle::Funko,
        ImageStyle::Claymation,
        ImageStyle::Simpsons,
        ImageStyle::RetroAnime,
        ImageStyle::Barbie,
        ImageStyle::Cyberpunk,
        ImageStyle::Watercolor,
        ImageStyle::Vector,
        ImageStyle::Neon,
        ImageStyle::ColoringBook,
        ImageStyle::Steampunk,
        ImageStyle::OilPainting,
        ImageStyle::PopArt,
        ImageStyle::UkiyoE,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ImageStyle::Realistic => "realistic",
            ImageStyle::Pixar => "pixar",
            ImageStyle::Lego => "lego",
            ImageStyle::Ghibli => "ghibli",
            ImageStyle::Gta => "gta",
            ImageStyle::Minecraft => "minecraft",
            ImageStyle::Funko => "funko",
            ImageStyle::Claymation => "claymation",
            ImageStyle::Simpsons => "simpsons",
            ImageStyle::RetroAnime => "retro-anime",
            ImageStyle::Barbie => "barbie",
            ImageStyle::Cyberpunk => "cyberpunk",
            ImageStyle::Watercolor => "watercolor",
            ImageStyle::Vector => "vector",
            ImageStyle::Neon => "neon",
            ImageStyle::ColoringBook => "coloring-book",
            ImageStyle::Steampunk => "steampunk",
            ImageStyle::OilPainting => "oil-painting",
            ImageStyle::PopArt => "pop-art",
            ImageStyle::UkiyoE => "ukiyo-e",
        }
    }

    /// Parse a style tag. Anything unrecognized maps to `Realistic`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.tag().eq_ignore_ascii_case(tag))
            .unwrap_or_default()
    }
}

impl From<String> for ImageStyle {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<ImageStyle> for String {
    fn from(style: ImageStyle) -> Self {
        style.tag().to_string()
    }
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Snapshot of the user's generation settings, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub model: ImageModel,
    pub prompt: String,
    pub style: ImageStyle,
    pub aspect_ratio: AspectRatio,
    pub background: Background,
    pub resolution: Resolution,
    pub include_front: bool,
    pub include_left: bool,
    pub include_right: bool,
    pub include_top: bool,
    pub include_isometric: bool,
    pub batch_count: u32,
    pub use_border: bool,
    pub selected_palette_id: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: ImageModel::Flash,
            prompt: String::new(),
            style: ImageStyle::Realistic,
            aspect_ratio: AspectRatio::Square,
            background: Background::Black,
            resolution: Resolution::OneK,
            include_front: true,
            include_left: true,
            include_right: true,
            include_top: true,
            include_isometric: true,
            batch_count: 1,
            use_border: false,
            selected_palette_id: None,
        }
    }
}

impl GenerationConfig {
    /// Requested angles in generation order. The first one anchors a chain.
    pub fn selected_angles(&self) -> Vec<Angle> {
        let flags = [
            self.include_front,
            self.include_left,
            self.include_right,
            self.include_top,
            self.include_isometric,
        ];
        Angle::ALL
            .iter()
            .zip(flags)
            .filter(|(_, on)| *on)
            .map(|(a, _)| *a)
            .collect()
    }

    /// Enable exactly the given angles.
    pub fn with_angles(mut self, angles: &[Angle]) -> Self {
        self.include_front = angles.contains(&Angle::Front);
        self.include_left = angles.contains(&Angle::LeftSide);
        self.include_right = angles.contains(&Angle::RightSide);
        self.include_top = angles.contains(&Angle::TopDown);
        self.include_isometric = angles.contains(&Angle::Isometric);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Batch count, never below 1.
    pub fn effective_batch_count(&self) -> u32 {
        self.batch_count.max(1)
    }
}

/// A persisted generation result. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    /// Data URL (`data:image/png;base64,...`).
    pub image_data: String,
    pub angle: Angle,
    pub prompt: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub resolution: Resolution,
}

impl GeneratedImage {
    pub fn new(image_data: String, angle: Angle, prompt: String, resolution: Resolution) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_data,
            angle,
            prompt,
            timestamp: chrono::Utc::now().timestamp_millis(),
            resolution,
        }
    }
}
