//! Operator-facing tables.

use lab_core::FINISHED_ROUND;
use lab_runtime::{GameSession, PairResult, TickReport};
use std::fmt::Write;

pub fn tick_summary(session: &GameSession, report: &TickReport) -> String {
    let mut out = String::new();
    let roster = session.roster();
    let _ = writeln!(
        out,
        "Scored {} round(s), carried {} price(s) forward. Binding round: {}",
        report.scored.len(),
        report.backfills.len(),
        session.binding_round().min(lab_core::MAX_ROUNDS)
    );
    for w in &report.waiting {
        let names: Vec<&str> = w.missing.iter().map(|id| roster.name_of(id)).collect();
        let _ = writeln!(out, "  waiting on round {}: {}", w.round, names.join(", "));
    }
    if session.is_finished() {
        let _ = writeln!(out, "All rounds played.");
    }
    out
}

pub fn rankings(session: &GameSession, top_n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Top {top_n} individuals");
    for (i, s) in session.rankings(top_n).iter().enumerate() {
        let _ = writeln!(out, "{:>3}. {:<24} {:>10}", i + 1, s.name, s.total_profit);
    }
    let _ = writeln!(out, "Top {top_n} pairs");
    for (i, s) in session.pair_totals(top_n).iter().enumerate() {
        let names = format!("{} & {}", s.first_name, s.second_name);
        let _ = writeln!(out, "{:>3}. {:<40} {:>10}", i + 1, names, s.total_profit);
    }
    out
}

pub fn pairings(session: &GameSession) -> String {
    let Some(pairings) = session.pairings() else {
        return "Nobody is paired yet; pairs form on the first advance.\n".to_string();
    };
    let roster = session.roster();
    let ledger = session.ledger();
    let mut out = String::new();
    for p in pairings {
        let round = ledger.current_round(&p.first).unwrap_or(0);
        let tag = if p.residual { " (residual)" } else { "" };
        let progress = if round >= FINISHED_ROUND {
            "finished".to_string()
        } else {
            format!("next round {round}")
        };
        let _ = writeln!(
            out,
            "{} vs {}{tag}, {progress}",
            roster.name_of(&p.first),
            roster.name_of(&p.second),
        );
    }
    out
}

pub fn final_results(results: &[PairResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<24} {:>10} {:>10} {:>10}",
        "Student 1", "Student 2", "Profit 1", "Profit 2", "Market"
    );
    for r in results {
        let _ = writeln!(
            out,
            "{:<24} {:<24} {:>10} {:>10} {:>10}",
            r.first_name, r.second_name, r.first_total, r.second_total, r.market_total
        );
    }
    out
}
