//! A section workbook kept as YAML files in one directory.
//!
//! `pricing.yaml` holds the roster and the prices students enter. The other
//! sheets are rewritten by the game after every tick.

use crate::PersistenceError;
use lab_core::{
    is_valid_price, parse_price, LabError, Participant, ParticipantId, PriceSheet, Roster,
    MAX_ROUNDS,
};
use lab_runtime::{Backfill, PairResult, ResultSink, RoundLedger, SubmissionSource};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PRICING: &str = "pricing.yaml";
pub const RIVAL_PRICES: &str = "rival_prices.yaml";
pub const MARKET_SHARES: &str = "market_shares.yaml";
pub const PROFITS: &str = "profits.yaml";
pub const GAME_RESULTS: &str = "game_results.yaml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PricingFile {
    participants: Vec<PricingRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PricingRow {
    id: String,
    name: String,
    /// Raw cells; anything that is not a number is treated as missing.
    #[serde(default)]
    prices: Vec<Value>,
}

/// One participant's row in a result sheet.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetRow<T> {
    pub id: String,
    pub name: String,
    pub rounds: Vec<Option<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
}

fn cell_price(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64().filter(|v| is_valid_price(*v)),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

/// Directory-backed workbook of one section.
#[derive(Clone, Debug)]
pub struct Workbook {
    dir: PathBuf,
}

impl Workbook {
    /// Open an existing workbook directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.join(PRICING).is_file() {
            return Err(PersistenceError::InvalidWorkbook(format!(
                "{} has no {PRICING}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// Create a workbook with an empty price grid for `participants`.
    /// An existing pricing sheet is left untouched.
    pub fn create(
        dir: impl AsRef<Path>,
        participants: &[Participant],
    ) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let book = Self { dir };
        if !book.path(PRICING).is_file() {
            let file = PricingFile {
                participants: participants
                    .iter()
                    .map(|p| PricingRow {
                        id: p.id.as_str().to_string(),
                        name: p.name.clone(),
                        prices: Vec::new(),
                    })
                    .collect(),
            };
            book.write_yaml(PRICING, &file)?;
            info!(
                dir = %book.dir.display(),
                participants = participants.len(),
                "workbook created"
            );
        }
        Ok(book)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, sheet: &str) -> PathBuf {
        self.dir.join(sheet)
    }

    fn read_yaml<T: DeserializeOwned>(&self, sheet: &str) -> Result<T, PersistenceError> {
        let text = fs::read_to_string(self.path(sheet))?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Read a result sheet written by the game.
    pub fn read_sheet<T: DeserializeOwned>(&self, sheet: &str) -> Result<T, PersistenceError> {
        self.read_yaml(sheet)
    }

    fn write_yaml<T>(&self, sheet: &str, value: &T) -> Result<(), PersistenceError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_yaml::to_string(value)?;
        fs::write(self.path(sheet), text)?;
        debug!(sheet, "sheet written");
        Ok(())
    }

    fn pricing(&self) -> Result<PricingFile, PersistenceError> {
        self.read_yaml(PRICING)
    }

    /// Fill price cells in the pricing sheet, keeping every other cell as entered.
    pub fn enter_prices(
        &self,
        cells: impl IntoIterator<Item = (ParticipantId, u8, f64)>,
    ) -> Result<(), PersistenceError> {
        let mut file = self.pricing()?;
        for (id, round, price) in cells {
            if !(1..=MAX_ROUNDS).contains(&round) {
                continue;
            }
            let Some(row) = file.participants.iter_mut().find(|r| r.id == id.as_str()) else {
                return Err(PersistenceError::InvalidWorkbook(format!(
                    "participant {id} is not in {PRICING}"
                )));
            };
            let idx = usize::from(round - 1);
            if row.prices.len() <= idx {
                row.prices.resize(idx + 1, Value::Null);
            }
            row.prices[idx] = Value::from(price);
        }
        self.write_yaml(PRICING, &file)
    }

    fn load_participants(&self) -> Result<Vec<Participant>, PersistenceError> {
        Ok(self
            .pricing()?
            .participants
            .into_iter()
            .map(|r| Participant::new(r.id.trim(), r.name.trim()))
            .collect())
    }

    fn load_prices(
        &self,
        ids: &[ParticipantId],
        rounds: &RangeInclusive<u8>,
    ) -> Result<PriceSheet, PersistenceError> {
        let file = self.pricing()?;
        let mut sheet = PriceSheet::new();
        for row in &file.participants {
            let id = ParticipantId::from(row.id.trim());
            if !ids.contains(&id) {
                continue;
            }
            let prices = (1..=MAX_ROUNDS)
                .map(|round| {
                    if !rounds.contains(&round) {
                        return None;
                    }
                    row.prices.get(usize::from(round - 1)).and_then(cell_price)
                })
                .collect();
            sheet.insert_row(id, prices);
        }
        Ok(sheet)
    }

    fn store_round_state(
        &self,
        ledger: &RoundLedger,
        roster: &Roster,
    ) -> Result<(), PersistenceError> {
        let mut rivals = Vec::with_capacity(roster.len());
        let mut shares = Vec::with_capacity(roster.len());
        let mut profits = Vec::with_capacity(roster.len());
        for p in roster.iter() {
            let Some(entry) = ledger.get(&p.id) else {
                continue;
            };
            let id = p.id.as_str().to_string();
            rivals.push(SheetRow {
                id: id.clone(),
                name: p.name.clone(),
                rounds: entry.rounds.iter().map(|r| r.rival_price).collect(),
                current_round: None,
                total: None,
            });
            shares.push(SheetRow {
                id: id.clone(),
                name: p.name.clone(),
                rounds: entry
                    .rounds
                    .iter()
                    .map(|r| r.market_share.map(|s| s.to_string()))
                    .collect(),
                current_round: None,
                total: None,
            });
            profits.push(SheetRow {
                id,
                name: p.name.clone(),
                rounds: entry.rounds.iter().map(|r| r.profit).collect(),
                current_round: Some(entry.current_round),
                total: Some(entry.total_profit),
            });
        }
        self.write_yaml(RIVAL_PRICES, &rivals)?;
        self.write_yaml(MARKET_SHARES, &shares)?;
        self.write_yaml(PROFITS, &profits)
    }

    /// Empty every price cell and drop the result sheets. The roster stays.
    fn clear_game(&self) -> Result<(), PersistenceError> {
        let mut file = self.pricing()?;
        for row in &mut file.participants {
            row.prices.clear();
        }
        self.write_yaml(PRICING, &file)?;
        for sheet in [RIVAL_PRICES, MARKET_SHARES, PROFITS, GAME_RESULTS] {
            let path = self.path(sheet);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

impl SubmissionSource for Workbook {
    fn load_roster(&mut self) -> Result<Vec<Participant>, LabError> {
        Ok(self.load_participants()?)
    }

    fn read_prices(
        &self,
        ids: &[ParticipantId],
        rounds: RangeInclusive<u8>,
    ) -> Result<PriceSheet, LabError> {
        Ok(self.load_prices(ids, &rounds)?)
    }
}

impl ResultSink for Workbook {
    fn reset(&mut self) -> Result<(), LabError> {
        Ok(self.clear_game()?)
    }

    fn write_round_state(
        &mut self,
        ledger: &RoundLedger,
        roster: &Roster,
    ) -> Result<(), LabError> {
        Ok(self.store_round_state(ledger, roster)?)
    }

    fn write_backfilled_prices(&mut self, backfills: &[Backfill]) -> Result<(), LabError> {
        let cells = backfills
            .iter()
            .map(|b| (b.participant.clone(), b.round, b.price));
        Ok(self.enter_prices(cells)?)
    }

    fn write_final_results(&mut self, results: &[PairResult]) -> Result<(), LabError> {
        Ok(self.write_yaml(GAME_RESULTS, results)?)
    }
}
