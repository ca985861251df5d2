//! One tick of the round engine: score every pairing that is ready.

use crate::ledger::RoundLedger;
use lab_core::{
    validate_config, GameConfig, LabError, Pairing, ParticipantId, PriceSheet, MAX_ROUNDS,
};
use lab_econ::FirmOutcome;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How a tick treats missing prices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceMode {
    /// Only score pairings whose prices for their current round are both in.
    Soft,
    /// Carry missing prices forward and catch every pairing up to the binding round.
    Hard,
}

/// A price filled in by a hard advance that must be written back to the sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Backfill {
    pub participant: ParticipantId,
    pub round: u8,
    pub price: f64,
}

/// A round scored during a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredRound {
    pub pairing: Pairing,
    pub round: u8,
    pub prices: (f64, f64),
    pub outcomes: (FirmOutcome, FirmOutcome),
}

/// A pairing left waiting by a soft advance.
#[derive(Clone, Debug, PartialEq)]
pub struct WaitingRound {
    pub pairing: Pairing,
    pub round: u8,
    pub missing: Vec<ParticipantId>,
}

/// What a tick did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub scored: Vec<ScoredRound>,
    pub waiting: Vec<WaitingRound>,
    pub backfills: Vec<Backfill>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.scored.is_empty() && self.waiting.is_empty() && self.backfills.is_empty()
    }
}

/// Applies the demand model to ready pairings and advances the ledger.
#[derive(Clone, Debug)]
pub struct RoundAdvancer {
    config: GameConfig,
}

impl RoundAdvancer {
    /// Fails with a configuration error before any state is touched.
    pub fn new(config: GameConfig) -> Result<Self, LabError> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Score every pairing that can be scored this tick.
    ///
    /// Soft mode attempts each pairing's current round and skips it when a
    /// price is missing. Hard mode attempts every round from the pairing's
    /// current round through the binding round, carrying the previous
    /// round's price forward for missing submissions; carried prices are
    /// written into `sheet` and listed in the report.
    pub fn advance(
        &self,
        sheet: &mut PriceSheet,
        pairings: &[Pairing],
        ledger: &mut RoundLedger,
        mode: AdvanceMode,
    ) -> Result<TickReport, LabError> {
        let binding = ledger.binding_round().clamp(1, MAX_ROUNDS);
        let mut report = TickReport::default();

        for pairing in pairings {
            let Some(source) = ledger.current_round(&pairing.first) else {
                debug!(first = %pairing.first, "pairing not in ledger, ignored");
                continue;
            };
            if ledger.get(&pairing.second).is_none() {
                debug!(second = %pairing.second, "pairing not in ledger, ignored");
                continue;
            }
            if source == 0 || source > MAX_ROUNDS {
                continue;
            }
            let last = match mode {
                AdvanceMode::Soft => source,
                AdvanceMode::Hard => binding,
            };

            for round in source..=last {
                let first = sheet.price(&pairing.first, round);
                let second = sheet.price(&pairing.second, round);
                let prices = match (first, second, mode) {
                    (Some(a), Some(b), _) => (a, b),
                    (a, b, AdvanceMode::Soft) => {
                        let mut missing = Vec::new();
                        if a.is_none() {
                            missing.push(pairing.first.clone());
                        }
                        if b.is_none() {
                            missing.push(pairing.second.clone());
                        }
                        report.waiting.push(WaitingRound {
                            pairing: pairing.clone(),
                            round,
                            missing,
                        });
                        break;
                    }
                    (_, _, AdvanceMode::Hard) => (
                        carry_forward(sheet, &pairing.first, round, &mut report)?,
                        carry_forward(sheet, &pairing.second, round, &mut report)?,
                    ),
                };
                let outcomes = self.score(pairing, round, prices, ledger)?;
                report.scored.push(ScoredRound {
                    pairing: pairing.clone(),
                    round,
                    prices,
                    outcomes,
                });
            }
        }

        info!(
            scored = report.scored.len(),
            waiting = report.waiting.len(),
            backfilled = report.backfills.len(),
            binding,
            ?mode,
            "tick computed"
        );
        Ok(report)
    }

    fn score(
        &self,
        pairing: &Pairing,
        round: u8,
        (p1, p2): (f64, f64),
        ledger: &mut RoundLedger,
    ) -> Result<(FirmOutcome, FirmOutcome), LabError> {
        let (o1, o2) = lab_econ::compute(p1, p2, &self.config)?;
        ledger.record_round(&pairing.first, round, p2, o1.share, o1.profit)?;
        ledger.advance_round(&pairing.first)?;
        // the absorbing side of a residual pairing is scored by its own pairing
        if !pairing.residual {
            ledger.record_round(&pairing.second, round, p1, o2.share, o2.profit)?;
            ledger.advance_round(&pairing.second)?;
        }
        debug!(
            first = %pairing.first,
            second = %pairing.second,
            round,
            p1,
            p2,
            profit1 = %o1.profit,
            profit2 = %o2.profit,
            "round scored"
        );
        Ok((o1, o2))
    }
}

/// Submitted price for `round`, or the price of `round - 1` written into the sheet.
fn carry_forward(
    sheet: &mut PriceSheet,
    id: &ParticipantId,
    round: u8,
    report: &mut TickReport,
) -> Result<f64, LabError> {
    if let Some(price) = sheet.price(id, round) {
        return Ok(price);
    }
    let previous = round
        .checked_sub(1)
        .and_then(|r| sheet.price(id, r))
        .ok_or_else(|| LabError::MissingData {
            participant: id.clone(),
            round,
        })?;
    sheet.set_price(id, round, previous);
    report.backfills.push(Backfill {
        participant: id.clone(),
        round,
        price: previous,
    });
    debug!(participant = %id, round, price = previous, "price carried forward");
    Ok(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::{PriceCompetitionConfig, FINISHED_ROUND};
    use rust_decimal::Decimal;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn bertrand() -> RoundAdvancer {
        RoundAdvancer::new(GameConfig::PriceCompetition(PriceCompetitionConfig::default()))
            .unwrap()
    }

    fn setup(ids: &[&str]) -> RoundLedger {
        let mut ledger = RoundLedger::new(ids.iter().map(|s| id(s)));
        for s in ids {
            ledger.activate(&id(s)).unwrap();
        }
        ledger
    }

    fn sheet(rows: &[(&str, Vec<Option<f64>>)]) -> PriceSheet {
        let mut sheet = PriceSheet::new();
        for (s, prices) in rows {
            sheet.insert_row(id(s), prices.clone());
        }
        sheet
    }

    #[test]
    fn soft_advance_scores_complete_pairs() {
        let mut ledger = setup(&["S1", "S2"]);
        let mut prices = sheet(&[("S1", vec![Some(10.0)]), ("S2", vec![Some(20.0)])]);
        let pairings = vec![Pairing::new(id("S1"), id("S2"))];
        let report = bertrand()
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        assert_eq!(report.scored.len(), 1);
        assert!(report.backfills.is_empty());
        let s1 = ledger.get(&id("S1")).unwrap();
        assert_eq!(s1.current_round, 2);
        assert_eq!(s1.total_profit, Decimal::new(900, 0));
        assert_eq!(s1.record(1).unwrap().rival_price, Some(20.0));
        let s2 = ledger.get(&id("S2")).unwrap();
        assert_eq!(s2.current_round, 2);
        assert_eq!(s2.record(1).unwrap().market_share.unwrap().to_string(), "0.0%");
    }

    #[test]
    fn soft_advance_waits_for_missing_price() {
        let mut ledger = setup(&["S1", "S2"]);
        let mut prices = sheet(&[("S1", vec![Some(10.0)]), ("S2", vec![None])]);
        let pairings = vec![Pairing::new(id("S1"), id("S2"))];
        let before = ledger.clone();
        let report = bertrand()
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        assert!(report.scored.is_empty());
        assert_eq!(report.waiting.len(), 1);
        assert_eq!(report.waiting[0].missing, vec![id("S2")]);
        assert_eq!(ledger, before);
    }

    #[test]
    fn hard_advance_carries_previous_price_forward() {
        let mut ledger = setup(&["S1", "S2"]);
        let mut prices = sheet(&[
            ("S1", vec![Some(10.0), Some(12.0), Some(14.0)]),
            ("S2", vec![Some(20.0), Some(18.0), None]),
        ]);
        let pairings = vec![Pairing::new(id("S1"), id("S2"))];
        let adv = bertrand();
        adv.advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        adv.advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        assert_eq!(ledger.current_round(&id("S1")), Some(3));

        let report = adv
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Hard)
            .unwrap();
        assert_eq!(
            report.backfills,
            vec![Backfill {
                participant: id("S2"),
                round: 3,
                price: 18.0
            }]
        );
        assert_eq!(prices.price(&id("S2"), 3), Some(18.0));
        assert_eq!(ledger.current_round(&id("S1")), Some(4));
        assert_eq!(ledger.current_round(&id("S2")), Some(4));
        let rec = ledger.get(&id("S1")).unwrap().record(3).unwrap().clone();
        assert_eq!(rec.rival_price, Some(18.0));
    }

    #[test]
    fn hard_advance_catches_up_to_binding_round() {
        let mut ledger = setup(&["S1", "S2", "S3", "S4"]);
        let mut prices = sheet(&[
            ("S1", vec![Some(10.0), Some(10.0), Some(10.0)]),
            ("S2", vec![Some(10.0), Some(10.0), Some(10.0)]),
            ("S3", vec![Some(30.0)]),
            ("S4", vec![Some(40.0)]),
        ]);
        let pairings = vec![
            Pairing::new(id("S1"), id("S2")),
            Pairing::new(id("S3"), id("S4")),
        ];
        let adv = bertrand();
        // S1/S2 race ahead to round 3
        adv.advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        adv.advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        assert_eq!(ledger.current_round(&id("S1")), Some(3));
        assert_eq!(ledger.current_round(&id("S3")), Some(2));
        assert_eq!(ledger.binding_round(), 2);

        let report = adv
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Hard)
            .unwrap();
        // binding round is 2: S1/S2 are ahead and untouched, S3/S4 play round 2
        assert_eq!(report.scored.len(), 1);
        assert_eq!(report.backfills.len(), 2);
        assert_eq!(ledger.current_round(&id("S1")), Some(3));
        assert_eq!(ledger.current_round(&id("S3")), Some(3));
    }

    #[test]
    fn hard_advance_repeats_carry_forward_across_rounds() {
        let mut ledger = setup(&["S1", "S2", "S3", "S4"]);
        let mut prices = sheet(&[
            ("S1", vec![Some(10.0), Some(11.0), Some(12.0), Some(13.0)]),
            ("S2", vec![Some(10.0), Some(11.0), Some(12.0), Some(13.0)]),
            ("S3", vec![Some(30.0)]),
            ("S4", vec![Some(40.0)]),
        ]);
        let pairings = vec![
            Pairing::new(id("S1"), id("S2")),
            Pairing::new(id("S3"), id("S4")),
        ];
        let adv = bertrand();
        // S3/S4 catch up through round 1 first, then the slow pair stays at 2
        for _ in 0..3 {
            adv.advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
                .unwrap();
        }
        assert_eq!(ledger.current_round(&id("S1")), Some(4));
        assert_eq!(ledger.current_round(&id("S3")), Some(2));
        // raise the binding round by moving the slow pair one step
        let report = adv
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Hard)
            .unwrap();
        assert_eq!(report.scored.len(), 1);
        let report = adv
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Hard)
            .unwrap();
        assert_eq!(report.scored.len(), 1);
        assert_eq!(prices.price(&id("S3"), 3), Some(30.0));
        assert_eq!(ledger.current_round(&id("S3")), Some(4));
    }

    #[test]
    fn residual_pairing_scores_primary_only() {
        let mut ledger = setup(&["S1", "S2", "S3"]);
        let mut prices = sheet(&[
            ("S1", vec![Some(10.0)]),
            ("S2", vec![Some(20.0)]),
            ("S3", vec![Some(30.0)]),
        ]);
        let pairings = vec![
            Pairing::new(id("S1"), id("S2")),
            Pairing::residual(id("S3"), id("S2")),
        ];
        let report = bertrand()
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Soft)
            .unwrap();
        assert_eq!(report.scored.len(), 2);
        // S2 advanced once, through its own pairing
        assert_eq!(ledger.current_round(&id("S2")), Some(2));
        assert_eq!(ledger.current_round(&id("S3")), Some(2));
        assert_eq!(ledger.total_profit(&id("S2")), Decimal::ZERO);
        assert_eq!(
            ledger.get(&id("S3")).unwrap().record(1).unwrap().rival_price,
            Some(20.0)
        );
    }

    #[test]
    fn hard_advance_without_round_one_price_is_an_error() {
        let mut ledger = setup(&["S1", "S2"]);
        let mut prices = sheet(&[("S1", vec![Some(10.0)]), ("S2", vec![None])]);
        let pairings = vec![Pairing::new(id("S1"), id("S2"))];
        let err = bertrand()
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Hard)
            .unwrap_err();
        assert_eq!(
            err,
            LabError::MissingData {
                participant: id("S2"),
                round: 1
            }
        );
    }

    #[test]
    fn unknown_and_finished_pairings_are_skipped() {
        let mut ledger = setup(&["S1", "S2"]);
        for _ in 0..10 {
            ledger.advance_round(&id("S1")).unwrap();
            ledger.advance_round(&id("S2")).unwrap();
        }
        assert_eq!(ledger.current_round(&id("S1")), Some(FINISHED_ROUND));
        let mut prices = sheet(&[("S1", vec![Some(1.0)]), ("S2", vec![Some(1.0)])]);
        let pairings = vec![
            Pairing::new(id("S1"), id("S2")),
            Pairing::new(id("X1"), id("X2")),
        ];
        let report = bertrand()
            .advance(&mut prices, &pairings, &mut ledger, AdvanceMode::Hard)
            .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let cfg = GameConfig::PriceCompetition(PriceCompetitionConfig {
            slope: -1.0,
            cost: 0.0,
        });
        assert!(matches!(
            RoundAdvancer::new(cfg),
            Err(LabError::Configuration(_))
        ));
    }
}
