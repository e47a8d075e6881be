use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RarityTier {
    #[default]
    Common,
    Rare,
    Epic,
    Legendary,
}

impl RarityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(Self::Common),
            "rare" => Some(Self::Rare),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }

    /// Multiplier applied to burst particle counts and glow strength.
    pub fn intensity(&self) -> f32 {
        match self {
            Self::Common => 1.0,
            Self::Rare => 1.15,
            Self::Epic => 1.3,
            Self::Legendary => 1.5,
        }
    }

    /// Accent colour as packed `0xRRGGBB`.
    pub fn accent_rgb(&self) -> u32 {
        match self {
            Self::Common => 0x9c_a3_af,
            Self::Rare => 0x3b_82_f6,
            Self::Epic => 0xa8_55_f7,
            Self::Legendary => 0xf5_9e_0b,
        }
    }

    /// Root pitch for the procedural summoning audio.
    pub fn base_pitch_hz(&self) -> f32 {
        match self {
            Self::Common => 220.0,
            Self::Rare => 246.94,
            Self::Epic => 277.18,
            Self::Legendary => 329.63,
        }
    }
}

/// Immutable description of the project being summoned.
///
/// Supplied by the caller. The engine shares it behind an `Arc` and never
/// mutates it; the detail presenter receives exactly this value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub id: String,
    pub display_name: String,
    pub rarity: RarityTier,
    pub category: String,
    pub importance: f32,
    /// Arbitrary detail payload forwarded to the detail presenter.
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "unknown"))]
    pub detail: serde_json::Value,
}

impl ProjectDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            rarity: RarityTier::default(),
            category: String::new(),
            importance: 0.0,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_rarity(mut self, rarity: RarityTier) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    /// Short summary taken from the detail payload, if one is present.
    pub fn summary(&self) -> Option<&str> {
        ["summary", "description", "tagline"]
            .iter()
            .find_map(|key| self.detail.get(key).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidDescriptor("id is empty".to_string()));
        }
        if !self.importance.is_finite() {
            return Err(CoreError::InvalidDescriptor(format!(
                "importance is not finite for {}",
                self.id
            )));
        }
        Ok(())
    }
}
