use crate::models::{PlaceKind, ZenPlace};
use crate::recommend::profile::PreferenceProfile;

const BASE_SCORE: f64 = 50.0;

/// Score a place for a profile, clamped to 0..=100.
///
/// Kind-specific weighting first, then keyword bonuses on name/description.
pub fn score_place(place: &ZenPlace, profile: &PreferenceProfile) -> f64 {
    let mut score = BASE_SCORE + score_kind(place.kind, profile);

    let name = place.name.to_lowercase();
    let description = place.description.to_lowercase();

    if name.contains("garden") && profile.gardens {
        score += 10.0;
    }

    if name.contains("water") || description.contains("water") {
        score += profile.water * 2.0;
    }

    if (name.contains("view") || description.contains("view")) && profile.viewpoints {
        score += 10.0;
    }

    score.clamp(0.0, 100.0)
}

fn score_kind(kind: PlaceKind, p: &PreferenceProfile) -> f64 {
    match kind {
        PlaceKind::Park => {
            let mut s = bonus(p.parks, 20.0) + p.nature * 2.5 + p.outdoor * 2.0 + (10.0 - p.urban) * 1.5;
            // Parks mean little to someone who does not care for nature
            if p.nature < 4.0 {
                s -= 20.0;
            }
            s
        }
        PlaceKind::Garden => {
            let mut s = bonus(p.gardens, 25.0) + p.nature * 2.0 + p.meditation;
            if !p.gardens {
                s -= 15.0;
            }
            s
        }
        PlaceKind::Cafe => {
            let mut s = bonus(p.cafes, 25.0) + p.indoor * 1.5 + p.social * 2.0;
            if p.social < 4.0 {
                s -= 15.0;
            }
            if !p.cafes {
                s -= 15.0;
            }
            s
        }
        PlaceKind::Meditation => {
            let mut s = p.meditation * 4.0 + p.quiet * 2.0 + p.solitude * 1.5;
            if p.meditation < 5.0 {
                s -= 40.0;
            }
            s
        }
    }
}

fn bonus(enabled: bool, amount: f64) -> f64 {
    if enabled {
        amount
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    fn place(kind: PlaceKind, name: &str, description: &str) -> ZenPlace {
        ZenPlace::new("x", name, description, kind, GeoPoint::new(0.0, 0.0))
    }

    #[test]
    fn meditation_leaning_profile_favours_meditation_over_cafe() {
        let profile = PreferenceProfile::meditation_leaning();
        let center = score_place(&place(PlaceKind::Meditation, "Center", ""), &profile);
        let cafe = score_place(&place(PlaceKind::Cafe, "Cafe", ""), &profile);
        let garden = score_place(&place(PlaceKind::Garden, "Hortus", ""), &profile);
        assert_eq!(center, 95.5);
        assert_eq!(cafe, 52.5);
        assert_eq!(garden, 52.0);
    }

    #[test]
    fn scores_are_clamped() {
        let profile = PreferenceProfile::meditation_leaning();
        let park = score_place(&place(PlaceKind::Park, "Waterside park", ""), &profile);
        assert_eq!(park, 100.0);

        let averse = PreferenceProfile {
            meditation: 1.0,
            quiet: 1.0,
            solitude: 1.0,
            ..PreferenceProfile::default()
        };
        let center = score_place(&place(PlaceKind::Meditation, "Center", ""), &averse);
        assert_eq!(center, 17.5);
    }

    #[test]
    fn keyword_bonuses_apply() {
        let profile = PreferenceProfile {
            viewpoints: true,
            ..PreferenceProfile::default()
        };
        let plain = score_place(&place(PlaceKind::Cafe, "Cafe", "cosy"), &profile);
        let with_view = score_place(&place(PlaceKind::Cafe, "Cafe", "great view over the water"), &profile);
        // +10 viewpoint, +10 water (5 * 2)
        assert_eq!(with_view - plain, 20.0);
    }
}
