#![deny(warnings)]

//! Round engine for the pricing lab: pairing, the round ledger, advancing
//! rounds and the game session that drives the external workbook.

mod advance;
mod ledger;
pub mod memory;
mod pairing;
mod ports;
mod report;
mod session;

pub use advance::{AdvanceMode, Backfill, RoundAdvancer, ScoredRound, TickReport, WaitingRound};
pub use ledger::RoundLedger;
pub use pairing::{Assignment, PairingAssigner};
pub use ports::{PlotRenderer, ResultSink, SubmissionSource};
pub use report::{
    average_prices, final_results, pair_standings, plot_data, standings, PairResult,
    PairSeries, PairStanding, ParticipantSeries, PlotData, RoundAverage, SeriesPoint, Standing,
};
pub use session::{GameSession, PendingWrites, SessionSnapshot};
