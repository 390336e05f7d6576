use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::models::{GeoPoint, PlaceKind, ZenPlace};
use crate::recommend::{profile::PreferenceProfile, scoring::score_place, PlaceRecommender};

/// Built-in places around Amsterdam.
pub fn default_catalog() -> Vec<ZenPlace> {
    vec![
        ZenPlace::new(
            "1",
            "Vondelpark Meditation Garden",
            "A peaceful corner in Amsterdam's famous park, perfect for meditation and reflection.",
            PlaceKind::Park,
            GeoPoint::new(52.3579, 4.8686),
        ),
        ZenPlace::new(
            "2",
            "Zen Garden Cafe",
            "A tranquil cafe with Japanese-inspired decor and a peaceful atmosphere.",
            PlaceKind::Cafe,
            GeoPoint::new(52.3673, 4.9041),
        ),
        ZenPlace::new(
            "3",
            "Hortus Botanicus",
            "One of the oldest botanical gardens with peaceful walking paths and meditation spots.",
            PlaceKind::Garden,
            GeoPoint::new(52.3667, 4.9089),
        ),
        ZenPlace::new(
            "4",
            "Buddhist Center Amsterdam",
            "A peaceful meditation center offering guided sessions and quiet spaces.",
            PlaceKind::Meditation,
            GeoPoint::new(52.3726, 4.8926),
        ),
    ]
}

/// Scores a fixed catalog; only places within `radius_m` of the query
/// position are considered.
pub struct CatalogRecommender {
    places: Vec<ZenPlace>,
    radius_m: f64,
}

impl CatalogRecommender {
    pub fn new(places: Vec<ZenPlace>, radius_m: f64) -> Self {
        Self { places, radius_m }
    }

    pub fn rank(&self, profile: &PreferenceProfile, near: GeoPoint, limit: usize) -> Vec<ZenPlace> {
        let mut scored: Vec<(f64, &ZenPlace)> = self
            .places
            .iter()
            .filter(|place| place.coordinates.distance_m(&near) <= self.radius_m)
            .map(|place| (score_place(place, profile), place))
            .collect();

        // Stable sort keeps catalog order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        for (score, place) in &scored {
            debug!("Scored {} ({}): {}", place.name, place.kind.as_str(), score);
        }

        scored
            .into_iter()
            .take(limit)
            .map(|(_, place)| place.clone())
            .collect()
    }
}

#[async_trait]
impl PlaceRecommender for CatalogRecommender {
    async fn recommend(
        &self,
        profile: &PreferenceProfile,
        near: GeoPoint,
        limit: usize,
    ) -> Result<Vec<ZenPlace>> {
        Ok(self.rank(profile, near, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DEFAULT_LATITUDE, DEFAULT_LONGITUDE};

    fn centre() -> GeoPoint {
        GeoPoint::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
    }

    #[test]
    fn top_pick_near_centre_is_meditation_center() {
        let recommender = CatalogRecommender::new(default_catalog(), 2_000.0);
        let ranked = recommender.rank(&PreferenceProfile::meditation_leaning(), centre(), 10);
        let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
        // Vondelpark is ~2.6 km away and falls outside the radius.
        assert_eq!(
            names,
            vec!["Buddhist Center Amsterdam", "Zen Garden Cafe", "Hortus Botanicus"]
        );
    }

    #[test]
    fn limit_truncates() {
        let recommender = CatalogRecommender::new(default_catalog(), 10_000.0);
        let ranked = recommender.rank(&PreferenceProfile::meditation_leaning(), centre(), 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "Vondelpark Meditation Garden");
    }

    #[tokio::test]
    async fn nothing_nearby_yields_empty() {
        let recommender = CatalogRecommender::new(default_catalog(), 2_000.0);
        let far_away = GeoPoint::new(48.8566, 2.3522);
        let places = recommender
            .recommend(&PreferenceProfile::default(), far_away, 1)
            .await
            .unwrap();
        assert!(places.is_empty());
    }
}
