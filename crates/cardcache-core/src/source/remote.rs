use async_trait::async_trait;
use tracing::debug;

use super::{CardSource, SourceMode};
use crate::api::{ApiClient, ApiError};
use crate::models::{CacheKey, CardCandidate, CardsResponse};

/// Upper bound the query API accepts for `pageSize`.
const MAX_PAGE_SIZE: usize = 250;

/// Candidates requested per kept card, so the selector has sets to choose from.
const CANDIDATE_OVERSAMPLE: usize = 10;

/// Fields requested from the query API.
const SELECT_FIELDS: &str = "id,name,supertype,rarity,set,images";

/// Queries the card API, one request per key, newest release first.
#[derive(Clone)]
pub struct RemoteSource {
    client: ApiClient,
}

impl RemoteSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn page_size(limit: usize) -> usize {
        limit
            .saturating_mul(CANDIDATE_OVERSAMPLE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[async_trait]
impl CardSource for RemoteSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Remote
    }

    async fn fetch_candidates(
        &self,
        key: CacheKey,
        limit: usize,
    ) -> Result<Vec<CardCandidate>, ApiError> {
        let query = [
            ("q", format!("nationalPokedexNumbers:{}", key.get())),
            ("orderBy", "-set.releaseDate".to_string()),
            ("pageSize", Self::page_size(limit).to_string()),
            ("select", SELECT_FIELDS.to_string()),
        ];

        let response: CardsResponse = self.client.get_json("cards", &query).await?;
        let returned = response.data.len();

        let candidates: Vec<CardCandidate> = response
            .data
            .into_iter()
            .filter(|card| card.supertype.is_none() || card.is_pokemon())
            .filter_map(|card| card.into_candidate())
            .collect();

        debug!(
            key = %key,
            returned,
            usable = candidates.len(),
            total = ?response.total_count,
            "Remote candidates fetched"
        );
        Ok(candidates)
    }
}
