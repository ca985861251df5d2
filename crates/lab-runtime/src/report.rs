//! Rankings, final results and chart series derived from the ledger.

use crate::ledger::RoundLedger;
use lab_core::{Pairing, ParticipantId, PriceSheet, ReferencePrice, Roster, MAX_ROUNDS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A participant and their cumulative profit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub id: ParticipantId,
    pub name: String,
    pub total_profit: Decimal,
}

/// A pairing and the combined profit of its two firms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairStanding {
    pub pairing: Pairing,
    pub first_name: String,
    pub second_name: String,
    pub total_profit: Decimal,
}

/// One row of the end-of-game results table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    pub first_name: String,
    pub second_name: String,
    pub first_total: Decimal,
    pub second_total: Decimal,
    pub market_total: Decimal,
}

/// Participants by total profit, best first. Ties keep roster order.
pub fn standings(ledger: &RoundLedger, roster: &Roster) -> Vec<Standing> {
    let mut rows: Vec<Standing> = roster
        .iter()
        .map(|p| Standing {
            id: p.id.clone(),
            name: p.name.clone(),
            total_profit: ledger.total_profit(&p.id),
        })
        .collect();
    rows.sort_by(|a, b| b.total_profit.cmp(&a.total_profit));
    rows
}

/// Pairings by combined profit, best first.
///
/// A residual pairing counts the absorbing participant's total as well, so
/// every market is ranked on the profits of both of its firms.
pub fn pair_standings(
    ledger: &RoundLedger,
    roster: &Roster,
    pairings: &[Pairing],
) -> Vec<PairStanding> {
    let mut rows: Vec<PairStanding> = pairings
        .iter()
        .map(|p| PairStanding {
            pairing: p.clone(),
            first_name: roster.name_of(&p.first).to_string(),
            second_name: roster.name_of(&p.second).to_string(),
            total_profit: ledger.total_profit(&p.first) + ledger.total_profit(&p.second),
        })
        .collect();
    rows.sort_by(|a, b| b.total_profit.cmp(&a.total_profit));
    rows
}

/// Results table written at the end of the game.
pub fn final_results(
    ledger: &RoundLedger,
    roster: &Roster,
    pairings: &[Pairing],
) -> Vec<PairResult> {
    pair_standings(ledger, roster, pairings)
        .into_iter()
        .map(|s| {
            let first_total = ledger.total_profit(&s.pairing.first);
            let second_total = ledger.total_profit(&s.pairing.second);
            PairResult {
                first_name: s.first_name,
                second_name: s.second_name,
                first_total: first_total.round_dp(1),
                second_total: second_total.round_dp(1),
                market_total: s.total_profit,
            }
        })
        .collect()
}

/// A price (and profit, once scored) for one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub round: u8,
    pub price: f64,
    pub profit: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSeries {
    pub id: ParticipantId,
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

/// Both firms of a market, ranked by combined profit (1 = best).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairSeries {
    pub rank: usize,
    pub first: ParticipantSeries,
    pub second: ParticipantSeries,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundAverage {
    pub round: u8,
    /// Mean of every submitted price, `None` when nobody submitted.
    pub price: Option<f64>,
}

/// Data behind the end-of-game charts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub section: String,
    /// Game tag and date, e.g. `bertrand_alpha1_c0_2024-03-01`.
    pub label: String,
    pub pairs: Vec<PairSeries>,
    pub average_prices: Vec<RoundAverage>,
    pub reference_prices: Vec<ReferencePrice>,
}

fn series(
    id: &ParticipantId,
    roster: &Roster,
    ledger: &RoundLedger,
    sheet: &PriceSheet,
) -> ParticipantSeries {
    let entry = ledger.get(id);
    let points = (1..=MAX_ROUNDS)
        .filter_map(|round| {
            let price = sheet.price(id, round)?;
            let profit = entry.and_then(|e| e.record(round)).and_then(|r| r.profit);
            Some(SeriesPoint {
                round,
                price,
                profit,
            })
        })
        .collect();
    ParticipantSeries {
        id: id.clone(),
        name: roster.name_of(id).to_string(),
        points,
    }
}

/// Mean submitted price per round across the whole sheet.
pub fn average_prices(sheet: &PriceSheet) -> Vec<RoundAverage> {
    (1..=MAX_ROUNDS)
        .map(|round| {
            let prices = sheet.round_prices(round);
            let price = if prices.is_empty() {
                None
            } else {
                Some(prices.iter().sum::<f64>() / prices.len() as f64)
            };
            RoundAverage { round, price }
        })
        .collect()
}

/// Assemble the chart data for a finished (or abandoned) game.
pub fn plot_data(
    section: &str,
    label: &str,
    ledger: &RoundLedger,
    roster: &Roster,
    pairings: &[Pairing],
    sheet: &PriceSheet,
    reference_prices: &[ReferencePrice],
) -> PlotData {
    let pairs = pair_standings(ledger, roster, pairings)
        .into_iter()
        .enumerate()
        .map(|(i, s)| PairSeries {
            rank: i + 1,
            first: series(&s.pairing.first, roster, ledger, sheet),
            second: series(&s.pairing.second, roster, ledger, sheet),
        })
        .collect();
    PlotData {
        section: section.to_string(),
        label: label.to_string(),
        pairs,
        average_prices: average_prices(sheet),
        reference_prices: reference_prices.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::{MarketShare, Participant};

    fn fixture() -> (RoundLedger, Roster, Vec<Pairing>) {
        let roster = Roster::new(vec![
            Participant::new("S1", "Ann Lee"),
            Participant::new("S2", "Bo Chen"),
            Participant::new("S3", "Cy Diaz"),
            Participant::new("S4", "Di Eze"),
        ])
        .unwrap();
        let mut ledger = RoundLedger::new(roster.ids());
        let profits = [("S1", 900), ("S2", 0), ("S3", 450), ("S4", 500)];
        for (id, profit) in profits {
            let id = ParticipantId::from(id);
            ledger.activate(&id).unwrap();
            ledger
                .record_round(&id, 1, 10.0, MarketShare(0.5), Decimal::new(profit, 0))
                .unwrap();
        }
        let pairings = vec![
            Pairing::new("S1".into(), "S2".into()),
            Pairing::new("S3".into(), "S4".into()),
        ];
        (ledger, roster, pairings)
    }

    #[test]
    fn standings_are_sorted() {
        let (ledger, roster, _) = fixture();
        let rows = standings(&ledger, &roster);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Ann Lee", "Di Eze", "Cy Diaz", "Bo Chen"]);
    }

    #[test]
    fn pairs_ranked_by_market_profit() {
        let (ledger, roster, pairings) = fixture();
        let rows = pair_standings(&ledger, &roster, &pairings);
        assert_eq!(rows[0].first_name, "Cy Diaz");
        assert_eq!(rows[0].total_profit, Decimal::new(950, 0));
        let results = final_results(&ledger, &roster, &pairings);
        assert_eq!(results[1].first_total, Decimal::new(900, 0));
        assert_eq!(results[1].market_total, Decimal::new(900, 0));
    }

    #[test]
    fn plot_series_skip_missing_prices() {
        let (ledger, roster, pairings) = fixture();
        let mut sheet = PriceSheet::new();
        sheet.insert_row("S1".into(), vec![Some(10.0), None, Some(12.0)]);
        sheet.insert_row("S2".into(), vec![Some(20.0)]);
        let plot = plot_data("Sec A", "tag", &ledger, &roster, &pairings, &sheet, &[]);
        assert_eq!(plot.pairs.len(), 2);
        let ann = &plot.pairs[1].first;
        assert_eq!(ann.points.len(), 2);
        assert_eq!(ann.points[0].profit, Some(Decimal::new(900, 0)));
        assert_eq!(ann.points[1].round, 3);
        assert_eq!(ann.points[1].profit, None);
        assert_eq!(plot.average_prices[0].price, Some(15.0));
        assert_eq!(plot.average_prices[1].price, None);
    }
}
