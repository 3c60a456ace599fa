use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::RecommendationItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClothingCategory {
    Top,
    Bottom,
    Outer,
    OnePiece,
    Accessory,
}

impl ClothingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClothingCategory::Top => "TOP",
            ClothingCategory::Bottom => "BOTTOM",
            ClothingCategory::Outer => "OUTER",
            ClothingCategory::OnePiece => "ONE_PIECE",
            ClothingCategory::Accessory => "ACCESSORY",
        }
    }
}

impl Display for ClothingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClothingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TOP" => Ok(ClothingCategory::Top),
            "BOTTOM" => Ok(ClothingCategory::Bottom),
            "OUTER" => Ok(ClothingCategory::Outer),
            "ONE_PIECE" => Ok(ClothingCategory::OnePiece),
            "ACCESSORY" => Ok(ClothingCategory::Accessory),
            other => Err(format!("unknown clothing category: {}", other)),
        }
    }
}

/// Catalog row offered to the recommendation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ClothingCandidate {
    pub clothing_id: i64,
    pub name: String,
    pub category: ClothingCategory,
}

impl From<ClothingCandidate> for RecommendationItem {
    fn from(candidate: ClothingCandidate) -> Self {
        RecommendationItem {
            clothing_id: Some(candidate.clothing_id),
            name: Some(candidate.name),
            category: Some(candidate.category.to_string()),
        }
    }
}
