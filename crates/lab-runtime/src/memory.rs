//! In-memory workbook used by tests, benches and dry runs.

use crate::advance::Backfill;
use crate::ledger::RoundLedger;
use crate::ports::{PlotRenderer, ResultSink, SubmissionSource};
use crate::report::{PairResult, PlotData};
use lab_core::{
    LabError, LedgerEntry, Participant, ParticipantId, PriceSheet, Roster, MAX_ROUNDS,
};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Roster, price grid and published results held in memory.
///
/// The `fail_*` switches make the next calls fail with
/// [`LabError::ExternalIo`] until they are cleared.
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    pub participants: Vec<Participant>,
    pub prices: PriceSheet,
    pub round_state: BTreeMap<ParticipantId, LedgerEntry>,
    pub final_results: Vec<PairResult>,
    pub writes: usize,
    pub resets: usize,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryWorkbook {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self {
            participants,
            ..Self::default()
        }
    }

    /// Enter a price the way a student would fill in a cell.
    pub fn submit(&mut self, id: &str, round: u8, price: f64) {
        self.prices.set_price(&ParticipantId::from(id), round, price);
    }

    fn check_read(&self) -> Result<(), LabError> {
        if self.fail_reads {
            return Err(LabError::ExternalIo("workbook unavailable for reading".into()));
        }
        Ok(())
    }

    fn check_write(&mut self) -> Result<(), LabError> {
        if self.fail_writes {
            return Err(LabError::ExternalIo("workbook unavailable for writing".into()));
        }
        self.writes += 1;
        Ok(())
    }
}

impl SubmissionSource for MemoryWorkbook {
    fn load_roster(&mut self) -> Result<Vec<Participant>, LabError> {
        self.check_read()?;
        Ok(self.participants.clone())
    }

    fn read_prices(
        &self,
        ids: &[ParticipantId],
        rounds: RangeInclusive<u8>,
    ) -> Result<PriceSheet, LabError> {
        self.check_read()?;
        let mut sheet = PriceSheet::new();
        for id in ids {
            let row = (1..=MAX_ROUNDS)
                .map(|r| {
                    if rounds.contains(&r) {
                        self.prices.price(id, r)
                    } else {
                        None
                    }
                })
                .collect();
            sheet.insert_row(id.clone(), row);
        }
        Ok(sheet)
    }
}

impl ResultSink for MemoryWorkbook {
    fn reset(&mut self) -> Result<(), LabError> {
        self.check_write()?;
        self.prices = PriceSheet::new();
        self.round_state.clear();
        self.final_results.clear();
        self.resets += 1;
        Ok(())
    }

    fn write_round_state(
        &mut self,
        ledger: &RoundLedger,
        _roster: &Roster,
    ) -> Result<(), LabError> {
        self.check_write()?;
        self.round_state = ledger.iter().map(|(id, e)| (id.clone(), e.clone())).collect();
        Ok(())
    }

    fn write_backfilled_prices(&mut self, backfills: &[Backfill]) -> Result<(), LabError> {
        self.check_write()?;
        for b in backfills {
            self.prices.set_price(&b.participant, b.round, b.price);
        }
        Ok(())
    }

    fn write_final_results(&mut self, results: &[PairResult]) -> Result<(), LabError> {
        self.check_write()?;
        self.final_results = results.to_vec();
        Ok(())
    }
}

/// Keeps every rendered chart.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    pub plots: Vec<PlotData>,
}

impl PlotRenderer for RecordingRenderer {
    fn render(&mut self, plot: &PlotData) -> Result<(), LabError> {
        self.plots.push(plot.clone());
        Ok(())
    }
}
