use once_cell::sync::Lazy;
use rand::Rng;
use thiserror::Error;

use crate::models::Rarity;

/// How close the tier probabilities must come to summing to 1.
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Blueprint for a spawnable item. Instances get their unique id when placed
/// on the grid.
#[derive(Debug, Clone, Copy)]
pub struct ItemDef {
    pub emoji: &'static str,
    pub points: u32,
    pub rarity: Rarity,
}

/// One rarity tier with its spawn probability and the items it can produce.
#[derive(Debug, Clone)]
pub struct TierDef {
    pub rarity: Rarity,
    pub chance: f64,
    pub items: Vec<ItemDef>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("item catalog has no tiers")]
    Empty,
    #[error("tier {0:?} has no items")]
    EmptyTier(Rarity),
    #[error("tier {0:?} has a negative spawn chance")]
    NegativeChance(Rarity),
    #[error("tiers must be listed from rarest to most common")]
    Misordered,
    #[error("tier probabilities sum to {0}, expected 1")]
    BadProbabilityMass(f64),
}

/// The spawn table: tiers in draw order (rarest first), each carrying its
/// probability and item pool. The last tier is the low tier that survives
/// the partial clear.
#[derive(Debug, Clone)]
pub struct ItemCatalog {
    tiers: Vec<TierDef>,
}

fn tier(rarity: Rarity, chance: f64, points: u32, emojis: &[&'static str]) -> TierDef {
    TierDef {
        rarity,
        chance,
        items: emojis
            .iter()
            .map(|&emoji| ItemDef {
                emoji,
                points,
                rarity,
            })
            .collect(),
    }
}

static STANDARD_TIERS: Lazy<Vec<TierDef>> = Lazy::new(|| {
    vec![
        tier(Rarity::Legendary, 0.0005, 100_000, &["🍌"]),
        tier(Rarity::Rare, 0.05, 2_000, &["🥝", "🪞", "👻", "🦖"]),
        tier(
            Rarity::Uncommon,
            0.15,
            100,
            &["🚀", "🍦", "🦎", "🔔", "🍩", "📱", "🥫", "🧢", "🦫"],
        ),
        tier(
            Rarity::Common,
            0.40,
            15,
            &["🐶", "🐒", "🐍", "🫖", "🕯️", "🍭", "🥤", "🍊", "🍋"],
        ),
        tier(
            Rarity::VeryCommon,
            0.3995,
            5,
            &["🪙", "🧤", "⚔️", "🎲", "🦡", "🍰", "🎈", "🔑"],
        ),
    ]
});

impl ItemCatalog {
    /// Build the stock catalog used by real sessions.
    pub fn standard() -> Self {
        Self {
            tiers: STANDARD_TIERS.clone(),
        }
    }

    pub fn from_tiers(tiers: Vec<TierDef>) -> Self {
        Self { tiers }
    }

    /// Validate the table once, at session construction.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.tiers.is_empty() {
            return Err(CatalogError::Empty);
        }
        for pair in self.tiers.windows(2) {
            if pair[0].rarity >= pair[1].rarity {
                return Err(CatalogError::Misordered);
            }
        }
        let mut sum = 0.0;
        for t in &self.tiers {
            if t.items.is_empty() {
                return Err(CatalogError::EmptyTier(t.rarity));
            }
            if t.chance < 0.0 {
                return Err(CatalogError::NegativeChance(t.rarity));
            }
            sum += t.chance;
        }
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(CatalogError::BadProbabilityMass(sum));
        }
        Ok(())
    }

    /// The rarity of the last (most common) tier.
    pub fn lowest_rarity(&self) -> Rarity {
        self.tiers.last().map(|t| t.rarity).unwrap_or(Rarity::VeryCommon)
    }

    /// Select the tier for a uniform roll in `[0, 1)` by walking the
    /// cumulative distribution. If floating-point rounding leaves the roll
    /// unmatched, the lowest tier is the safe fallback.
    fn tier_for_roll(&self, roll: f64) -> &TierDef {
        let mut cumulative = 0.0;
        for t in &self.tiers {
            cumulative += t.chance;
            if roll < cumulative {
                return t;
            }
        }
        &self.tiers[self.tiers.len() - 1]
    }

    /// Draw an item with tier probabilities applied, then uniformly within
    /// the selected tier.
    pub fn draw_weighted(&self, rng: &mut impl Rng) -> &ItemDef {
        let t = self.tier_for_roll(rng.random::<f64>());
        &t.items[rng.random_range(0..t.items.len())]
    }

    /// Draw uniformly from the lowest tier only.
    pub fn draw_low_tier(&self, rng: &mut impl Rng) -> &ItemDef {
        let t = &self.tiers[self.tiers.len() - 1];
        &t.items[rng.random_range(0..t.items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn standard_catalog_is_valid() {
        ItemCatalog::standard().validate().expect("stock table should validate");
    }

    #[test]
    fn standard_catalog_lowest_tier_is_very_common() {
        assert_eq!(ItemCatalog::standard().lowest_rarity(), Rarity::VeryCommon);
    }

    #[test]
    fn rejects_empty_catalog() {
        let catalog = ItemCatalog::from_tiers(vec![]);
        assert!(matches!(catalog.validate(), Err(CatalogError::Empty)));
    }

    #[test]
    fn rejects_probability_mass_away_from_one() {
        let catalog = ItemCatalog::from_tiers(vec![
            tier(Rarity::Rare, 0.3, 100, &["🥝"]),
            tier(Rarity::VeryCommon, 0.3, 5, &["🪙"]),
        ]);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::BadProbabilityMass(_))
        ));
    }

    #[test]
    fn rejects_misordered_tiers() {
        let catalog = ItemCatalog::from_tiers(vec![
            tier(Rarity::VeryCommon, 0.5, 5, &["🪙"]),
            tier(Rarity::Rare, 0.5, 100, &["🥝"]),
        ]);
        assert!(matches!(catalog.validate(), Err(CatalogError::Misordered)));
    }

    #[test]
    fn rejects_empty_tier() {
        let catalog = ItemCatalog::from_tiers(vec![
            tier(Rarity::Rare, 0.5, 100, &["🥝"]),
            tier(Rarity::VeryCommon, 0.5, 5, &[]),
        ]);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::EmptyTier(Rarity::VeryCommon))
        ));
    }

    #[test]
    fn tier_selection_follows_cumulative_boundaries() {
        let catalog = ItemCatalog::standard();
        assert_eq!(catalog.tier_for_roll(0.0).rarity, Rarity::Legendary);
        assert_eq!(catalog.tier_for_roll(0.0004).rarity, Rarity::Legendary);
        assert_eq!(catalog.tier_for_roll(0.0006).rarity, Rarity::Rare);
        assert_eq!(catalog.tier_for_roll(0.05).rarity, Rarity::Uncommon);
        assert_eq!(catalog.tier_for_roll(0.25).rarity, Rarity::Common);
        assert_eq!(catalog.tier_for_roll(0.75).rarity, Rarity::VeryCommon);
    }

    #[test]
    fn unmatched_roll_falls_back_to_lowest_tier() {
        // A probability mass fractionally below 1 is within tolerance but can
        // leave a roll close to 1 unmatched.
        let catalog = ItemCatalog::from_tiers(vec![
            tier(Rarity::Rare, 0.5, 100, &["🥝"]),
            tier(Rarity::VeryCommon, 0.5 - 1e-7, 5, &["🪙"]),
        ]);
        catalog.validate().expect("within tolerance");
        assert_eq!(catalog.tier_for_roll(0.9999999999).rarity, Rarity::VeryCommon);
    }

    #[test]
    fn weighted_draw_converges_to_configured_probabilities() {
        let catalog = ItemCatalog::standard();
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 200_000;
        let mut counts = std::collections::HashMap::new();
        for _ in 0..draws {
            *counts.entry(catalog.draw_weighted(&mut rng).rarity).or_insert(0u32) += 1;
        }

        for t in STANDARD_TIERS.iter() {
            let observed = *counts.get(&t.rarity).unwrap_or(&0) as f64 / draws as f64;
            if t.chance >= 0.01 {
                assert!(
                    (observed - t.chance).abs() < 0.01,
                    "{:?}: observed {} vs configured {}",
                    t.rarity,
                    observed,
                    t.chance
                );
            } else {
                assert!(observed < 0.01, "{:?}: observed {}", t.rarity, observed);
            }
        }
    }

    #[test]
    fn low_tier_draw_only_returns_lowest_tier_items() {
        let catalog = ItemCatalog::standard();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let item = catalog.draw_low_tier(&mut rng);
            assert_eq!(item.rarity, Rarity::VeryCommon);
            assert_eq!(item.points, 5);
        }
    }
}
