#![deny(warnings)]

//! Demand models for the two-firm pricing games.
//!
//! This crate maps a pair of submitted prices to market shares and profits:
//! - Winner-take-all price competition (homogeneous Bertrand)
//! - Linear-city spatial competition (Hotelling) with a reservation value
//! - Reference prices (Nash equilibrium, monopoly) drawn on price charts

use lab_core::{
    is_valid_price, validate_config, GameConfig, LabError, MarketShare, PriceCompetitionConfig,
    ReferencePrice, SpatialCompetitionConfig, SpatialPreset, MAX_PRICE, TOTAL_DEMAND,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::trace;

/// Result of one round for one firm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FirmOutcome {
    pub share: MarketShare,
    /// Profit rounded to one decimal.
    pub profit: Decimal,
}

fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Market shares as fractions, before profits are computed.
fn shares(p1: f64, p2: f64, config: &GameConfig) -> (f64, f64) {
    match config {
        GameConfig::PriceCompetition(c) => price_competition_shares(p1, p2, c),
        GameConfig::SpatialCompetition(c) => spatial_shares(p1, p2, c),
    }
}

/// Winner takes all; ties split the single-firm demand evenly.
fn price_competition_shares(p1: f64, p2: f64, c: &PriceCompetitionConfig) -> (f64, f64) {
    let demand_at = |p: f64| 1.0 - c.slope * p / TOTAL_DEMAND;
    if p1 < p2 {
        (clip(demand_at(p1), 0.0, 1.0), 0.0)
    } else if p1 > p2 {
        (0.0, clip(demand_at(p2), 0.0, 1.0))
    } else {
        let s = clip(demand_at(p1) / 2.0, 0.0, 0.5);
        (s, s)
    }
}

/// Firms sit at both ends of a line of length 100.
///
/// `xm` is the consumer indifferent between the two firms, `xa0` and `xb0`
/// are the points where buying from firm 1 (resp. firm 2) stops being worth
/// the reservation value. When `xa0 < xb0` the middle of the line is not
/// served and each firm behaves as a local monopolist.
fn spatial_shares(p1: f64, p2: f64, c: &SpatialCompetitionConfig) -> (f64, f64) {
    let t = c.transport;
    let v = c.valuation;
    let xm = (-p1 + p2 + TOTAL_DEMAND * t) / (2.0 * t);
    let xa0 = (v - p1) / t;
    let xb0 = TOTAL_DEMAND - (v - p2) / t;
    if xa0 < xb0 {
        trace!(xa0, xb0, "market not covered");
        (
            clip(xa0 / TOTAL_DEMAND, 0.0, 1.0),
            clip((TOTAL_DEMAND - xb0) / TOTAL_DEMAND, 0.0, 1.0),
        )
    } else {
        let s1 = clip(xm, 0.0, TOTAL_DEMAND) / TOTAL_DEMAND;
        (s1, 1.0 - s1)
    }
}

fn profit(share: f64, price: f64, cost: f64) -> Result<Decimal, LabError> {
    let raw = share * (price - cost) * TOTAL_DEMAND;
    Decimal::from_f64(raw)
        .map(|d| d.round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven))
        .ok_or_else(|| LabError::Configuration(format!("profit {raw} is not representable")))
}

/// Shares and profits of both firms for one round.
///
/// Example:
/// let cfg = GameConfig::PriceCompetition(PriceCompetitionConfig::default());
/// let (a, b) = compute(10.0, 20.0, &cfg).unwrap();
/// assert_eq!(a.share.to_string(), "90.0%");
pub fn compute(
    p1: f64,
    p2: f64,
    config: &GameConfig,
) -> Result<(FirmOutcome, FirmOutcome), LabError> {
    validate_config(config)?;
    if !(is_valid_price(p1) && is_valid_price(p2)) {
        return Err(LabError::Configuration(format!(
            "prices must be finite and at most {MAX_PRICE}, got {p1} and {p2}"
        )));
    }
    let (s1, s2) = shares(p1, p2, config);
    let cost = config.cost();
    Ok((
        FirmOutcome {
            share: MarketShare(s1),
            profit: profit(s1, p1, cost)?,
        },
        FirmOutcome {
            share: MarketShare(s2),
            profit: profit(s2, p2, cost)?,
        },
    ))
}

/// Reference lines for price charts.
///
/// For spatial games the monopoly line is only known for the two classroom
/// presets.
pub fn reference_prices(config: &GameConfig, preset: Option<SpatialPreset>) -> Vec<ReferencePrice> {
    let line = |label: &str, price: f64| ReferencePrice {
        label: label.to_string(),
        price,
    };
    match config {
        GameConfig::PriceCompetition(c) => {
            vec![line("NE", c.cost), line("Monopoly", (TOTAL_DEMAND + c.cost) / 2.0)]
        }
        GameConfig::SpatialCompetition(c) => {
            let ne = line("NE", c.cost + TOTAL_DEMAND * c.transport);
            match preset {
                Some(SpatialPreset::HighTransport) => vec![ne, line("Monopoly", 150.0)],
                Some(SpatialPreset::LowTransport) => vec![ne, line("Monopoly", 175.0)],
                Some(SpatialPreset::Custom) | None => vec![ne],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bertrand(slope: f64, cost: f64) -> GameConfig {
        GameConfig::PriceCompetition(PriceCompetitionConfig { slope, cost })
    }

    fn hotelling(transport: f64, cost: f64, valuation: f64) -> GameConfig {
        GameConfig::SpatialCompetition(SpatialCompetitionConfig {
            transport,
            cost,
            valuation,
        })
    }

    #[test]
    fn undercutting_takes_the_market() {
        let (a, b) = compute(10.0, 20.0, &bertrand(1.0, 0.0)).unwrap();
        assert_eq!(a.share.to_string(), "90.0%");
        assert_eq!(b.share.to_string(), "0.0%");
        assert_eq!(a.profit, Decimal::new(9000, 1));
        assert_eq!(b.profit, Decimal::ZERO);

        let (a, b) = compute(20.0, 10.0, &bertrand(1.0, 0.0)).unwrap();
        assert_eq!(a.share.fraction(), 0.0);
        assert_eq!(b.profit, Decimal::new(9000, 1));
    }

    #[test]
    fn equal_prices_split() {
        let (a, b) = compute(10.0, 10.0, &bertrand(1.0, 0.0)).unwrap();
        assert_eq!(a.share.to_string(), "45.0%");
        assert_eq!(a.share, b.share);
        assert_eq!(a.profit, Decimal::new(4500, 1));
        assert_eq!(b.profit, Decimal::new(4500, 1));
    }

    #[test]
    fn prices_below_cost_lose_money() {
        let (a, _) = compute(5.0, 20.0, &bertrand(1.0, 10.0)).unwrap();
        assert!(a.profit < Decimal::ZERO);
    }

    #[test]
    fn spatial_equilibrium_splits_market() {
        let (a, b) = compute(100.0, 100.0, &hotelling(1.0, 0.0, 200.0)).unwrap();
        assert_eq!(a.share.to_string(), "50.0%");
        assert_eq!(b.share.to_string(), "50.0%");
        assert_eq!(a.profit, Decimal::new(50000, 1));
        assert_eq!(b.profit, Decimal::new(50000, 1));
    }

    #[test]
    fn spatial_uncovered_market_leaves_middle_unserved() {
        // xa0 = 20, xb0 = 80
        let (a, b) = compute(180.0, 180.0, &hotelling(1.0, 0.0, 200.0)).unwrap();
        assert!((a.share.fraction() - 0.2).abs() < 1e-12);
        assert!((b.share.fraction() - 0.2).abs() < 1e-12);
        assert_eq!(a.profit, Decimal::new(36000, 1));
    }

    #[test]
    fn spatial_undercut_is_capped() {
        let (a, b) = compute(0.0, 250.0, &hotelling(1.0, 0.0, 200.0)).unwrap();
        assert_eq!(a.share.fraction(), 1.0);
        assert_eq!(b.share.fraction(), 0.0);
    }

    #[test]
    fn invalid_parameters_are_configuration_errors() {
        assert!(matches!(
            compute(1.0, 1.0, &hotelling(0.0, 0.0, 200.0)),
            Err(LabError::Configuration(_))
        ));
        assert!(matches!(
            compute(f64::NAN, 1.0, &bertrand(1.0, 0.0)),
            Err(LabError::Configuration(_))
        ));
        assert!(matches!(
            compute(1.0e27, 2.0e27, &bertrand(0.0, 0.0)),
            Err(LabError::Configuration(_))
        ));
    }

    #[test]
    fn largest_prices_still_score() {
        let (a, b) = compute(MAX_PRICE, -MAX_PRICE, &bertrand(0.0, 0.0)).unwrap();
        assert_eq!(a.profit, Decimal::ZERO);
        assert_eq!(b.profit, Decimal::new(-100_000_000_000, 0));
    }

    #[test]
    fn reference_lines() {
        let lines = reference_prices(&bertrand(1.0, 0.0), None);
        assert_eq!(lines[0].price, 0.0);
        assert_eq!(lines[1].price, 50.0);
        let cfg = GameConfig::SpatialCompetition(SpatialCompetitionConfig::LOW_TRANSPORT);
        let lines = reference_prices(&cfg, Some(SpatialPreset::LowTransport));
        assert_eq!(lines[0].price, 50.0);
        assert_eq!(lines[1].price, 175.0);
        let lines = reference_prices(&cfg, Some(SpatialPreset::Custom));
        assert_eq!(lines.len(), 1);
    }

    proptest! {
        #[test]
        fn price_competition_shares_bounded(p1 in 0.0f64..500.0, p2 in 0.0f64..500.0,
                                            slope in 0.0f64..5.0, cost in 0.0f64..50.0) {
            let (a, b) = compute(p1, p2, &bertrand(slope, cost)).unwrap();
            prop_assert!(a.share.fraction() + b.share.fraction() <= 1.0);
            prop_assert!(a.share.fraction() >= 0.0 && b.share.fraction() >= 0.0);
        }

        #[test]
        fn equal_prices_equal_shares(p in 0.0f64..500.0, slope in 0.0f64..5.0) {
            let (a, b) = compute(p, p, &bertrand(slope, 0.0)).unwrap();
            prop_assert_eq!(a.share, b.share);
            prop_assert_eq!(a.profit, b.profit);
        }

        #[test]
        fn any_valid_prices_give_a_profit(p1 in -MAX_PRICE..=MAX_PRICE,
                                          p2 in -MAX_PRICE..=MAX_PRICE,
                                          slope in 0.0f64..5.0,
                                          cost in 0.0f64..=MAX_PRICE) {
            prop_assert!(compute(p1, p2, &bertrand(slope, cost)).is_ok());
            prop_assert!(compute(p1, p2, &hotelling(1.0, cost, MAX_PRICE)).is_ok());
        }

        #[test]
        fn spatial_shares_bounded(p1 in 0.0f64..400.0, p2 in 0.0f64..400.0,
                                  t in 0.05f64..5.0, c in 0.0f64..50.0, v in 0.0f64..400.0) {
            let (a, b) = compute(p1, p2, &hotelling(t, c, v)).unwrap();
            let (s1, s2) = (a.share.fraction(), b.share.fraction());
            prop_assert!((0.0..=1.0).contains(&s1));
            prop_assert!((0.0..=1.0).contains(&s2));
            prop_assert!(s1 + s2 <= 1.0 + 1e-12);
        }
    }
}
