pub mod catalog;
pub mod profile;
pub mod scoring;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{GeoPoint, ZenPlace};

pub use catalog::{default_catalog, CatalogRecommender};
pub use profile::PreferenceProfile;
pub use scoring::score_place;

/// Ranks points of interest near a position for a preference profile.
/// Implementations may hit the network; callers apply their own timeout.
#[async_trait]
pub trait PlaceRecommender: Send + Sync {
    async fn recommend(
        &self,
        profile: &PreferenceProfile,
        near: GeoPoint,
        limit: usize,
    ) -> Result<Vec<ZenPlace>>;
}
