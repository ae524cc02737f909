// Allow dead code: wire structs keep fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Supertype value that marks a card as a creature card.
pub const POKEMON_SUPERTYPE: &str = "Pokémon";

// ============================================================================
// Wire types (query API and bulk dataset share the card shape)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardImages {
    pub small: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSet {
    pub id: String,
    pub name: String,
    #[serde(rename = "releaseDate")]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCard {
    pub id: String,
    pub name: String,
    pub supertype: Option<String>,
    pub rarity: Option<String>,
    /// Present in query results; bulk files carry the set in their file name.
    pub set: Option<ApiSet>,
    #[serde(default)]
    pub images: CardImages,
    #[serde(rename = "nationalPokedexNumbers", default)]
    pub national_pokedex_numbers: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CardsResponse {
    #[serde(default)]
    pub data: Vec<ApiCard>,
    #[serde(rename = "totalCount")]
    pub total_count: Option<u32>,
}

impl ApiCard {
    pub fn is_pokemon(&self) -> bool {
        self.supertype.as_deref() == Some(POKEMON_SUPERTYPE)
    }

    /// Large image if available, otherwise the small one.
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .large
            .as_deref()
            .or(self.images.small.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Convert into a candidate using the card's embedded set.
    /// Returns `None` when the card has no set or no usable image.
    pub fn into_candidate(self) -> Option<CardCandidate> {
        let set = self.set.clone()?;
        self.into_candidate_with_set(&set.id, &set.name, set.release_date.as_deref())
    }

    /// Convert into a candidate with externally supplied set details.
    pub fn into_candidate_with_set(
        self,
        set_id: &str,
        set_name: &str,
        release_date: Option<&str>,
    ) -> Option<CardCandidate> {
        let image_url = self.primary_image()?.to_string();
        Some(CardCandidate {
            id: self.id,
            name: self.name,
            set_id: set_id.to_string(),
            set_name: set_name.to_string(),
            rarity: self.rarity,
            image_url,
            release_date: release_date.map(str::to_string),
        })
    }
}

// ============================================================================
// Domain types
// ============================================================================

/// A card that could be cached for a key. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCandidate {
    pub id: String,
    pub name: String,
    pub set_id: String,
    pub set_name: String,
    pub rarity: Option<String>,
    pub image_url: String,
    /// `YYYY/MM/DD`, used only to order bulk candidates.
    pub release_date: Option<String>,
}

/// One persisted image entry in a key's `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCard {
    pub filename: String,
    #[serde(rename = "cardId")]
    pub card_id: String,
    pub name: String,
    #[serde(rename = "setName")]
    pub set_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl CachedCard {
    pub fn from_candidate(filename: String, candidate: &CardCandidate) -> Self {
        Self {
            filename,
            card_id: candidate.id.clone(),
            name: candidate.name.clone(),
            set_name: candidate.set_name.clone(),
            rarity: candidate.rarity.clone(),
            image_url: candidate.image_url.clone(),
        }
    }
}
