//! Idea generation — scores the fixed strategy universe against the
//! market snapshot and keeps only high-conviction candidates.

use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::debug;

use optloop_core::types::{Idea, MarketSnapshot, Regime, SkewClass, StrategyKind};

/// Minimum additive score for an idea to be emitted.
const SCORE_FLOOR: f64 = 0.30;

/// Chooses which underlying a candidate idea trades.
///
/// The selection policy is deliberately pluggable; production uses a
/// uniform draw, tests pin a fixed symbol.
pub trait UnderlyingPicker: Send + Sync {
    fn pick(&self, universe: &[String]) -> Option<String>;
}

/// Uniform random choice over the universe.
pub struct RandomPicker;

impl UnderlyingPicker for RandomPicker {
    fn pick(&self, universe: &[String]) -> Option<String> {
        universe.choose(&mut rand::thread_rng()).cloned()
    }
}

pub struct IdeaGenerator {
    universe: Vec<String>,
    picker: Box<dyn UnderlyingPicker>,
}

impl IdeaGenerator {
    #[must_use]
    pub fn new(universe: Vec<String>) -> Self {
        Self::with_picker(universe, Box::new(RandomPicker))
    }

    #[must_use]
    pub fn with_picker(universe: Vec<String>, picker: Box<dyn UnderlyingPicker>) -> Self {
        Self { universe, picker }
    }

    /// Scores every strategy once; emits an idea per strategy clearing the
    /// floor. A missing snapshot yields no ideas — that is upstream
    /// degradation, not an error.
    #[must_use]
    pub fn generate(&self, snapshot: Option<&MarketSnapshot>) -> Vec<Idea> {
        let Some(snap) = snapshot else {
            return Vec::new();
        };

        let mut ideas = Vec::new();
        for strategy in StrategyKind::ALL {
            let score = strategy_score(strategy, snap);
            if score <= SCORE_FLOOR {
                debug!(strategy = %strategy, score, "Below conviction floor");
                continue;
            }
            let Some(underlying) = self.picker.pick(&self.universe) else {
                continue;
            };

            let confidence = round3(0.55 + score * 0.40);
            let rationale = format!(
                "{strategy} on {underlying}: score {score:.2}, IV rank {:.0}, skew {}, VIX {:.1}, {} momentum",
                snap.iv_rank, snap.skew, snap.vix, snap.momentum
            );

            ideas.push(Idea {
                strategy,
                underlying,
                confidence,
                rationale,
                created_at: Utc::now(),
            });
        }

        ideas
    }
}

/// Additive conviction score for one strategy given the snapshot.
fn strategy_score(strategy: StrategyKind, snap: &MarketSnapshot) -> f64 {
    let mut score = 0.0;
    match strategy {
        StrategyKind::Straddle => {
            if snap.iv_rank > 65.0 && snap.vix > 25.0 {
                score += 0.45;
            }
            if snap.regime == Regime::HighVol {
                score += 0.25;
            }
        }
        StrategyKind::IronCondor => {
            if snap.iv_rank < 35.0 && snap.skew == SkewClass::Flat && snap.vix < 22.0 {
                score += 0.50;
            }
            if snap.regime == Regime::LowVol {
                score += 0.30;
            }
        }
        StrategyKind::CalendarSpread => {
            // Momentum is always directional in this snapshot model, so a
            // tilted curve is what carries the directional-edge condition.
            if snap.skew.is_steep() {
                score += 0.40;
            }
            if snap.skew != SkewClass::Flat {
                score += 0.25;
            }
        }
    }
    score
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use optloop_core::types::Momentum;
    use rust_decimal_macros::dec;

    struct FixedPicker(&'static str);

    impl UnderlyingPicker for FixedPicker {
        fn pick(&self, _universe: &[String]) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn snapshot(iv_rank: f64, skew: SkewClass, vix: f64, regime: Regime) -> MarketSnapshot {
        MarketSnapshot {
            iv_rank,
            skew,
            vix,
            momentum: Momentum::Bullish,
            regime,
            spot: dec!(100),
        }
    }

    fn generator() -> IdeaGenerator {
        IdeaGenerator::with_picker(
            vec!["SPY".to_string(), "AAPL".to_string()],
            Box::new(FixedPicker("SPY")),
        )
    }

    #[test]
    fn no_snapshot_means_no_ideas() {
        assert!(generator().generate(None).is_empty());
    }

    #[test]
    fn high_iv_high_vix_emits_straddle() {
        let snap = snapshot(70.0, SkewClass::Flat, 26.0, Regime::HighVol);
        let ideas = generator().generate(Some(&snap));

        let straddle = ideas
            .iter()
            .find(|i| i.strategy == StrategyKind::Straddle)
            .expect("straddle must be emitted");
        // score 0.45 + 0.25 => confidence 0.55 + 0.70 * 0.40
        assert!((straddle.confidence - 0.83).abs() < 1e-9);
        assert!(straddle.rationale.contains("SPY"));
    }

    #[test]
    fn straddle_iv_term_alone_stays_below_floor_without_regime() {
        // 0.45 from IV rank + VIX, low-vol regime adds nothing: emitted.
        let snap = snapshot(70.0, SkewClass::Flat, 26.0, Regime::LowVol);
        let ideas = generator().generate(Some(&snap));
        assert!(ideas.iter().any(|i| i.strategy == StrategyKind::Straddle));

        // Regime term alone (0.25) stays below the floor: not emitted.
        let snap = snapshot(40.0, SkewClass::Flat, 26.0, Regime::HighVol);
        let ideas = generator().generate(Some(&snap));
        assert!(!ideas.iter().any(|i| i.strategy == StrategyKind::Straddle));
    }

    #[test]
    fn calm_flat_market_emits_iron_condor() {
        let snap = snapshot(20.0, SkewClass::Flat, 15.0, Regime::LowVol);
        let ideas = generator().generate(Some(&snap));

        let condor = ideas
            .iter()
            .find(|i| i.strategy == StrategyKind::IronCondor)
            .expect("iron condor must be emitted");
        // score 0.50 + 0.30 => confidence 0.87
        assert!((condor.confidence - 0.87).abs() < 1e-9);
    }

    #[test]
    fn steep_skew_emits_calendar_spread() {
        let snap = snapshot(50.0, SkewClass::SteepPut, 23.0, Regime::LowVol);
        let ideas = generator().generate(Some(&snap));
        let calendar = ideas
            .iter()
            .find(|i| i.strategy == StrategyKind::CalendarSpread)
            .expect("calendar must be emitted");
        // score 0.40 + 0.25 => confidence 0.81
        assert!((calendar.confidence - 0.81).abs() < 1e-9);
    }

    #[test]
    fn confidence_stays_within_bounds_for_every_emitted_idea() {
        let skews = [SkewClass::Flat, SkewClass::SteepPut, SkewClass::SteepCall];
        let regimes = [Regime::HighVol, Regime::LowVol];
        for iv_rank in [0.0, 30.0, 70.0, 100.0] {
            for skew in skews {
                for vix in [10.0, 23.0, 30.0] {
                    for regime in regimes {
                        let snap = snapshot(iv_rank, skew, vix, regime);
                        for idea in generator().generate(Some(&snap)) {
                            assert!(
                                idea.confidence > 0.55 && idea.confidence <= 0.99,
                                "confidence {} out of range",
                                idea.confidence
                            );
                        }
                    }
                }
            }
        }
    }
}
