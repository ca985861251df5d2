//! The context object that owns one game from setup to final results.

use crate::advance::{AdvanceMode, Backfill, RoundAdvancer, TickReport};
use crate::ledger::RoundLedger;
use crate::pairing::PairingAssigner;
use crate::ports::{PlotRenderer, ResultSink, SubmissionSource};
use crate::report::{self, PairResult, PairStanding, PlotData, Standing};
use chrono::NaiveDate;
use lab_core::{
    validate_setup, GameSetup, LabError, Pairing, ParticipantId, Roster, MAX_ROUNDS,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Writes that still have to reach the result sink.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingWrites {
    pub backfills: Vec<Backfill>,
    pub round_state: bool,
}

impl PendingWrites {
    pub fn is_empty(&self) -> bool {
        self.backfills.is_empty() && !self.round_state
    }
}

/// Serializable state of a session, used for save games.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub section: String,
    pub setup: GameSetup,
    pub roster: Roster,
    pub pairings: Option<Vec<Pairing>>,
    pub residual: Option<ParticipantId>,
    pub ledger: RoundLedger,
    pub ticks: u32,
    pub pending: PendingWrites,
    pub started_on: NaiveDate,
    pub seed: u64,
}

/// One game for one section.
#[derive(Clone, Debug)]
pub struct GameSession {
    section: String,
    setup: GameSetup,
    roster: Roster,
    advancer: RoundAdvancer,
    assigner: PairingAssigner,
    pairings: Option<Vec<Pairing>>,
    residual: Option<ParticipantId>,
    ledger: RoundLedger,
    ticks: u32,
    pending: PendingWrites,
    started_on: NaiveDate,
    seed: u64,
}

impl GameSession {
    /// Session for an already loaded roster. Nobody is paired yet.
    pub fn new(
        section: &str,
        setup: GameSetup,
        roster: Roster,
        seed: u64,
        started_on: NaiveDate,
    ) -> Result<Self, LabError> {
        validate_setup(&setup)?;
        let advancer = RoundAdvancer::new(setup.config)?;
        let ledger = RoundLedger::new(roster.ids());
        Ok(Self {
            section: section.to_string(),
            setup,
            roster,
            advancer,
            assigner: PairingAssigner::new(seed),
            pairings: None,
            residual: None,
            ledger,
            ticks: 0,
            pending: PendingWrites::default(),
            started_on,
            seed,
        })
    }

    /// Load the roster from the sheet, clear stale results and start a game.
    pub fn start<W>(
        section: &str,
        setup: GameSetup,
        sheet: &mut W,
        seed: u64,
        started_on: NaiveDate,
    ) -> Result<Self, LabError>
    where
        W: SubmissionSource + ResultSink,
    {
        validate_setup(&setup)?;
        let participants = sheet.load_roster()?;
        if participants.is_empty() {
            return Err(LabError::Configuration(format!(
                "no participants found for section {section}"
            )));
        }
        let roster = Roster::new(participants)?;
        sheet.reset()?;
        info!(
            section,
            participants = roster.len(),
            mode = %setup.config.mode(),
            "game started"
        );
        Self::new(section, setup, roster, seed, started_on)
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn setup(&self) -> &GameSetup {
        &self.setup
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    pub fn pairings(&self) -> Option<&[Pairing]> {
        self.pairings.as_deref()
    }

    pub fn residual(&self) -> Option<&ParticipantId> {
        self.residual.as_ref()
    }

    /// Number of completed advance actions.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn binding_round(&self) -> u8 {
        self.ledger.binding_round()
    }

    pub fn is_finished(&self) -> bool {
        self.ledger.is_finished()
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Game tag plus start date, used to name output files.
    pub fn label(&self) -> String {
        format!("{}_{}", self.setup.config.abbrev(), self.started_on.format("%Y-%m-%d"))
    }

    /// Run one advance.
    ///
    /// Prices are read and the tick is computed on copies of the ledger and
    /// the sheet; the session only changes once both steps succeed. The
    /// results are then written out. If writing fails the new state is kept
    /// and the writes stay pending until [`GameSession::flush`] succeeds;
    /// the next tick flushes first.
    pub fn tick<W>(&mut self, sheet: &mut W, mode: AdvanceMode) -> Result<TickReport, LabError>
    where
        W: SubmissionSource + ResultSink,
    {
        self.flush(sheet)?;

        let ids = self.roster.ids();
        let mut prices = sheet.read_prices(&ids, 1..=MAX_ROUNDS)?;
        let mut ledger = self.ledger.clone();
        let mut assigner = self.assigner.clone();

        let (pairings, residual) = match &self.pairings {
            Some(pairings) => (pairings.clone(), self.residual.clone()),
            None => {
                let ready = prices.submitted(&ids, 1);
                let assignment = assigner.assign(&ready);
                if assignment.pairings.is_empty() {
                    warn!(
                        submitted = ready.len(),
                        "not enough round-1 prices to form pairings"
                    );
                    return Ok(TickReport::default());
                }
                for p in &assignment.pairings {
                    ledger.activate(&p.first)?;
                    ledger.activate(&p.second)?;
                }
                info!(pairings = assignment.pairings.len(), "participants paired");
                (assignment.pairings, assignment.residual)
            }
        };

        let report = self.advancer.advance(&mut prices, &pairings, &mut ledger, mode)?;

        self.ledger = ledger;
        self.assigner = assigner;
        self.pairings = Some(pairings);
        self.residual = residual;
        self.ticks += 1;
        self.pending.backfills.extend(report.backfills.iter().cloned());
        self.pending.round_state = true;
        info!(
            tick = self.ticks,
            binding_round = self.binding_round(),
            scored = report.scored.len(),
            "tick committed"
        );

        self.flush(sheet)?;
        Ok(report)
    }

    /// Send pending writes to the sink. Nothing is recomputed.
    pub fn flush<R: ResultSink + ?Sized>(&mut self, sink: &mut R) -> Result<(), LabError> {
        if !self.pending.backfills.is_empty() {
            sink.write_backfilled_prices(&self.pending.backfills)?;
            self.pending.backfills.clear();
        }
        if self.pending.round_state {
            sink.write_round_state(&self.ledger, &self.roster)?;
            self.pending.round_state = false;
        }
        Ok(())
    }

    /// Participants by total profit, best first.
    pub fn standings(&self) -> Vec<Standing> {
        report::standings(&self.ledger, &self.roster)
    }

    /// Pairings by combined profit, best first. Empty before pairing.
    pub fn pair_standings(&self) -> Vec<PairStanding> {
        report::pair_standings(&self.ledger, &self.roster, self.pairings().unwrap_or(&[]))
    }

    /// The `top_n` best participants.
    pub fn rankings(&self, top_n: usize) -> Vec<Standing> {
        let mut rows = self.standings();
        rows.truncate(top_n);
        rows
    }

    /// The `top_n` best markets.
    pub fn pair_totals(&self, top_n: usize) -> Vec<PairStanding> {
        let mut rows = self.pair_standings();
        rows.truncate(top_n);
        rows
    }

    pub fn final_results(&self) -> Vec<PairResult> {
        report::final_results(&self.ledger, &self.roster, self.pairings().unwrap_or(&[]))
    }

    /// Chart data from the current sheet and ledger.
    pub fn plot_data<S>(&self, source: &S) -> Result<PlotData, LabError>
    where
        S: SubmissionSource + ?Sized,
    {
        let prices = source.read_prices(&self.roster.ids(), 1..=MAX_ROUNDS)?;
        Ok(report::plot_data(
            &self.section,
            &self.label(),
            &self.ledger,
            &self.roster,
            self.pairings().unwrap_or(&[]),
            &prices,
            &self.setup.reference_prices,
        ))
    }

    /// End the game: flush, publish the results table and render the charts.
    pub fn finish<W, P>(
        &mut self,
        sheet: &mut W,
        renderer: &mut P,
    ) -> Result<Vec<PairResult>, LabError>
    where
        W: SubmissionSource + ResultSink,
        P: PlotRenderer + ?Sized,
    {
        self.flush(sheet)?;
        let results = self.final_results();
        sheet.write_final_results(&results)?;
        let plot = self.plot_data(&*sheet)?;
        renderer.render(&plot)?;
        info!(section = %self.section, markets = results.len(), "game finished");
        Ok(results)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            section: self.section.clone(),
            setup: self.setup.clone(),
            roster: self.roster.clone(),
            pairings: self.pairings.clone(),
            residual: self.residual.clone(),
            ledger: self.ledger.clone(),
            ticks: self.ticks,
            pending: self.pending.clone(),
            started_on: self.started_on,
            seed: self.seed,
        }
    }

    /// Rebuild a session from a save game.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self, LabError> {
        validate_setup(&snapshot.setup)?;
        let advancer = RoundAdvancer::new(snapshot.setup.config)?;
        Ok(Self {
            section: snapshot.section,
            setup: snapshot.setup,
            roster: snapshot.roster,
            advancer,
            assigner: PairingAssigner::new(snapshot.seed),
            pairings: snapshot.pairings,
            residual: snapshot.residual,
            ledger: snapshot.ledger,
            ticks: snapshot.ticks,
            pending: snapshot.pending,
            started_on: snapshot.started_on,
            seed: snapshot.seed,
        })
    }
}
