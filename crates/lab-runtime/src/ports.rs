//! Interfaces of the external collaborators driven by a game session.

use crate::advance::Backfill;
use crate::ledger::RoundLedger;
use crate::report::{PairResult, PlotData};
use lab_core::{LabError, Participant, ParticipantId, PriceSheet, Roster};
use std::ops::RangeInclusive;

/// Where students enter their prices.
pub trait SubmissionSource {
    /// Participants registered for the section.
    fn load_roster(&mut self) -> Result<Vec<Participant>, LabError>;

    /// Submitted prices for `ids` and `rounds`. Cells that are not numeric are absent.
    fn read_prices(
        &self,
        ids: &[ParticipantId],
        rounds: RangeInclusive<u8>,
    ) -> Result<PriceSheet, LabError>;
}

/// Where results are published.
pub trait ResultSink {
    /// Clear prices and results left over from a previous game.
    fn reset(&mut self) -> Result<(), LabError>;

    /// Rival prices, market shares, profits and totals of every participant.
    fn write_round_state(&mut self, ledger: &RoundLedger, roster: &Roster) -> Result<(), LabError>;

    /// Prices carried forward by a hard advance.
    fn write_backfilled_prices(&mut self, backfills: &[Backfill]) -> Result<(), LabError>;

    /// Pairings with their final totals, best market first.
    fn write_final_results(&mut self, results: &[PairResult]) -> Result<(), LabError>;
}

/// Turns the end-of-game series into charts.
pub trait PlotRenderer {
    fn render(&mut self, plot: &PlotData) -> Result<(), LabError>;
}
