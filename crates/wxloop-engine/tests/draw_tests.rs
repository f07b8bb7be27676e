//! Card draw integration tests.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use wxloop_engine::{CardDrawEngine, Catalog, SeededSource, SequenceSource};
use wxloop_models::{WeatherPool, WeatherType};

use common::{clip, small_catalog};

/// Without the repeat guard the draw frequencies follow the weights.
#[test]
fn test_weighted_distribution_matches_shares() {
    let catalog = Catalog::from_pools(vec![WeatherPool::new(
        WeatherType::Clear,
        vec![
            clip(WeatherType::Clear, "normal", 80),
            clip(WeatherType::Clear, "special", 15),
            clip(WeatherType::Clear, "rare", 5),
        ],
    )]);
    let mut engine = CardDrawEngine::new(Arc::new(catalog), Box::new(SeededSource::new(42)))
        .with_repeat_limit(u32::MAX);

    let trials = 20_000;
    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..trials {
        *counts.entry(engine.draw_card(WeatherType::Clear).id).or_insert(0) += 1;
    }

    for (id, share) in [("normal", 0.80), ("special", 0.15), ("rare", 0.05)] {
        let observed = f64::from(counts.get(id).copied().unwrap_or(0)) / f64::from(trials);
        assert!(
            (observed - share).abs() < 0.02,
            "{id}: observed {observed:.3}, expected {share}"
        );
    }
}

/// With the guard on, every clip still shows up and no clip dominates four in a row.
#[test]
fn test_guarded_draws_keep_every_clip_reachable() {
    let mut engine = CardDrawEngine::new(Arc::new(Catalog::static_table()), Box::new(SeededSource::new(7)));

    for &weather in WeatherType::ALL {
        let pool_size = Catalog::static_table().pool(weather).map(|p| p.len()).unwrap_or(0);
        let draws: Vec<String> = (0..10_000).map(|_| engine.draw_card(weather).id).collect();

        let distinct: std::collections::HashSet<&String> = draws.iter().collect();
        assert_eq!(distinct.len(), pool_size, "{weather}");
        for window in draws.windows(4) {
            assert!(window.iter().any(|id| id != &window[0]), "{weather}: {window:?}");
        }
    }
}

/// An RNG pinned to either end never yields the same clip four times running.
#[test]
fn test_adversarial_rng_cannot_force_long_streaks() {
    for sample in [0.0, 0.999_999] {
        let mut engine = CardDrawEngine::new(Arc::new(small_catalog()), Box::new(SequenceSource::constant(sample)));
        for weather in [WeatherType::Clear, WeatherType::Rain] {
            let draws: Vec<String> = (0..200).map(|_| engine.draw_card(weather).id).collect();
            for window in draws.windows(4) {
                assert!(window.iter().any(|id| id != &window[0]), "sample {sample}: {window:?}");
            }
        }
    }
}

/// `clear = [a:80, b:20]` with `r = 0.9 × total` lands on `b`.
#[test]
fn test_cumulative_walk_example() {
    let mut engine = CardDrawEngine::new(Arc::new(small_catalog()), Box::new(SequenceSource::constant(0.9)));
    assert_eq!(engine.draw_card(WeatherType::Clear).id, "b");
}

/// Consecutive counts are tracked per weather type.
#[test]
fn test_history_per_weather_type() {
    let mut engine = CardDrawEngine::new(Arc::new(small_catalog()), Box::new(SequenceSource::constant(0.0)));
    engine.draw_card(WeatherType::Clear);
    engine.draw_card(WeatherType::Clear);
    engine.draw_card(WeatherType::Rain);

    let history = engine.history();
    assert_eq!(history.last_clip_id.as_deref(), Some("r1"));
    assert_eq!(history.consecutive_count(WeatherType::Clear), 2);
    assert_eq!(history.consecutive_count(WeatherType::Rain), 1);
}
