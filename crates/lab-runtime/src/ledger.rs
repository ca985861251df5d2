//! Authoritative per-participant round state.

use lab_core::{
    LabError, LedgerEntry, MarketShare, ParticipantId, RoundRecord, FINISHED_ROUND, MAX_ROUNDS,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round progress, price history and cumulative profit keyed by participant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundLedger {
    entries: BTreeMap<ParticipantId, LedgerEntry>,
}

impl RoundLedger {
    /// Ledger with every participant unassigned (`current_round == 0`).
    pub fn new<I: IntoIterator<Item = ParticipantId>>(ids: I) -> Self {
        Self {
            entries: ids
                .into_iter()
                .map(|id| (id, LedgerEntry::default()))
                .collect(),
        }
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&LedgerEntry> {
        self.entries.get(id)
    }

    pub fn current_round(&self, id: &ParticipantId) -> Option<u8> {
        self.entries.get(id).map(|e| e.current_round)
    }

    pub fn total_profit(&self, id: &ParticipantId) -> Decimal {
        self.entries
            .get(id)
            .map(|e| e.total_profit)
            .unwrap_or(Decimal::ZERO)
    }

    /// Entries in participant-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &LedgerEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, id: &ParticipantId, round: u8) -> Result<&mut LedgerEntry, LabError> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| LabError::invariant(id, round, "participant is not in the ledger"))
    }

    /// Mark a participant as paired; it now awaits round 1. No-op when already active.
    pub fn activate(&mut self, id: &ParticipantId) -> Result<(), LabError> {
        let entry = self.entry_mut(id, 0)?;
        if entry.current_round == 0 {
            entry.current_round = 1;
        }
        Ok(())
    }

    /// Write the outcome of `round` for `id` and add the profit to the total.
    ///
    /// A round is written once, and only the round the participant is
    /// currently awaiting can be written.
    pub fn record_round(
        &mut self,
        id: &ParticipantId,
        round: u8,
        rival_price: f64,
        share: MarketShare,
        profit: Decimal,
    ) -> Result<(), LabError> {
        if !(1..=MAX_ROUNDS).contains(&round) {
            return Err(LabError::invariant(id, round, "round out of range"));
        }
        let entry = self.entry_mut(id, round)?;
        let idx = usize::from(round - 1);
        if entry.rounds[idx].is_recorded() {
            return Err(LabError::invariant(id, round, "round already recorded"));
        }
        if entry.current_round != round {
            return Err(LabError::invariant(
                id,
                round,
                format!("participant is awaiting round {}", entry.current_round),
            ));
        }
        entry.rounds[idx] = RoundRecord {
            rival_price: Some(rival_price),
            market_share: Some(share),
            profit: Some(profit),
        };
        entry.total_profit += profit;
        Ok(())
    }

    /// Move `id` to its next round, saturating at the finished marker.
    pub fn advance_round(&mut self, id: &ParticipantId) -> Result<u8, LabError> {
        let entry = self.entry_mut(id, 0)?;
        entry.current_round = (entry.current_round + 1).min(FINISHED_ROUND);
        Ok(entry.current_round)
    }

    /// Earliest round not yet completed by an active participant, 1 when nobody is active.
    pub fn binding_round(&self) -> u8 {
        self.entries
            .values()
            .filter(|e| e.is_active())
            .map(|e| e.current_round)
            .min()
            .unwrap_or(1)
    }

    /// True once every active participant has played all rounds.
    pub fn is_finished(&self) -> bool {
        self.binding_round() > MAX_ROUNDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn ledger() -> RoundLedger {
        RoundLedger::new([id("S1"), id("S2"), id("S3")])
    }

    #[test]
    fn binding_round_ignores_unassigned() {
        let mut l = ledger();
        assert_eq!(l.binding_round(), 1);
        l.activate(&id("S1")).unwrap();
        l.activate(&id("S2")).unwrap();
        l.advance_round(&id("S1")).unwrap();
        assert_eq!(l.binding_round(), 1);
        l.advance_round(&id("S2")).unwrap();
        assert_eq!(l.binding_round(), 2);
        assert_eq!(l.current_round(&id("S3")), Some(0));
    }

    #[test]
    fn record_then_total() {
        let mut l = ledger();
        l.activate(&id("S1")).unwrap();
        l.record_round(&id("S1"), 1, 20.0, MarketShare(0.9), Decimal::new(9000, 1))
            .unwrap();
        let e = l.get(&id("S1")).unwrap();
        assert_eq!(e.total_profit, Decimal::new(900, 0));
        assert_eq!(e.record(1).unwrap().rival_price, Some(20.0));
        assert_eq!(l.total_profit(&id("S1")), Decimal::new(900, 0));
        assert_eq!(l.total_profit(&id("S9")), Decimal::ZERO);
    }

    #[test]
    fn duplicate_write_is_an_invariant_violation() {
        let mut l = ledger();
        l.activate(&id("S1")).unwrap();
        l.record_round(&id("S1"), 1, 10.0, MarketShare(0.45), Decimal::new(450, 0))
            .unwrap();
        let err = l
            .record_round(&id("S1"), 1, 10.0, MarketShare(0.45), Decimal::new(450, 0))
            .unwrap_err();
        assert!(matches!(err, LabError::InvariantViolation { round: 1, .. }));
        // the first write is kept
        assert_eq!(l.total_profit(&id("S1")), Decimal::new(450, 0));
    }

    #[test]
    fn out_of_order_and_unknown_writes_fail() {
        let mut l = ledger();
        l.activate(&id("S1")).unwrap();
        for round in [0, 2, 11] {
            assert!(matches!(
                l.record_round(&id("S1"), round, 1.0, MarketShare(0.0), Decimal::ZERO),
                Err(LabError::InvariantViolation { .. })
            ));
        }
        assert!(l
            .record_round(&id("S9"), 1, 1.0, MarketShare(0.0), Decimal::ZERO)
            .is_err());
        assert!(l.advance_round(&id("S9")).is_err());
    }

    #[test]
    fn advance_saturates_at_finished() {
        let mut l = ledger();
        l.activate(&id("S1")).unwrap();
        for _ in 0..15 {
            l.advance_round(&id("S1")).unwrap();
        }
        assert_eq!(l.current_round(&id("S1")), Some(FINISHED_ROUND));
        assert!(l.is_finished());
        assert!(l.get(&id("S1")).unwrap().is_finished());
    }

    #[test]
    fn activate_is_idempotent() {
        let mut l = ledger();
        l.activate(&id("S2")).unwrap();
        l.advance_round(&id("S2")).unwrap();
        l.activate(&id("S2")).unwrap();
        assert_eq!(l.current_round(&id("S2")), Some(2));
    }
}
