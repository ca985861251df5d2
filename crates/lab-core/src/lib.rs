#![deny(warnings)]

//! Core domain models and invariants for the pricing lab.
//!
//! This crate defines the serializable types shared by the demand model, the
//! round engine and the persistence layer, together with validation helpers
//! and the error taxonomy used across the workspace.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of scored rounds in a game.
pub const MAX_ROUNDS: u8 = 10;
/// `current_round` value of a participant that has completed every round.
pub const FINISHED_ROUND: u8 = MAX_ROUNDS + 1;
/// Market size shared by both firms in every model.
pub const TOTAL_DEMAND: f64 = 100.0;
/// Largest price magnitude a cell may hold. Cells beyond it are treated as empty.
pub const MAX_PRICE: f64 = 1.0e9;

/// Errors shared by every layer of the lab.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LabError {
    /// Invalid mode or parameters. Raised before any ledger mutation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A ledger write that would break the single-write round history.
    #[error("invariant violation for {participant} in round {round}: {reason}")]
    InvariantViolation {
        participant: ParticipantId,
        round: u8,
        reason: String,
    },
    /// Hard advance found no earlier price to carry forward.
    #[error("no price available for {participant} in round {round}")]
    MissingData { participant: ParticipantId, round: u8 },
    /// Reading submissions or writing results failed.
    #[error("external I/O error: {0}")]
    ExternalIo(String),
}

impl LabError {
    pub fn invariant(participant: &ParticipantId, round: u8, reason: impl Into<String>) -> Self {
        LabError::InvariantViolation {
            participant: participant.clone(),
            round,
            reason: reason.into(),
        }
    }

    /// True for failures of the external collaborators, which the operator may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LabError::ExternalIo(_))
    }
}

/// Student identifier as entered in the roster, e.g. "S1024".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        ParticipantId(s.to_string())
    }
}

/// A student taking part in the game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
}

impl Participant {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: ParticipantId::from(id),
            name: name.to_string(),
        }
    }

    /// First word of the name, used for compact labels.
    pub fn short_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// The participants loaded for one game, in roster order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    /// Build a roster, rejecting blank or duplicate identifiers.
    pub fn new(participants: Vec<Participant>) -> Result<Self, LabError> {
        let mut seen = BTreeSet::new();
        for p in &participants {
            if p.id.0.trim().is_empty() {
                return Err(LabError::Configuration(format!(
                    "participant '{}' has an empty id",
                    p.name
                )));
            }
            if !seen.insert(&p.id) {
                return Err(LabError::Configuration(format!(
                    "duplicate participant id {}",
                    p.id
                )));
            }
        }
        Ok(Self { participants })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Display name for `id`, empty when unknown.
    pub fn name_of(&self, id: &ParticipantId) -> &str {
        self.get(id).map(|p| p.name.as_str()).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Two firms competing against each other for the whole game.
///
/// In a residual pairing `first` is the leftover participant of an odd roster
/// and `second` is an already-paired participant who absorbs it. Only `first`
/// is scored and advanced from a residual pairing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub first: ParticipantId,
    pub second: ParticipantId,
    pub residual: bool,
}

impl Pairing {
    pub fn new(first: ParticipantId, second: ParticipantId) -> Self {
        Self {
            first,
            second,
            residual: false,
        }
    }

    pub fn residual(leftover: ParticipantId, absorbing: ParticipantId) -> Self {
        Self {
            first: leftover,
            second: absorbing,
            residual: true,
        }
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        &self.first == id || &self.second == id
    }
}

/// Fraction of the market served by a firm, in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MarketShare(pub f64);

impl MarketShare {
    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl fmt::Display for MarketShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0 * 100.0)
    }
}

/// Outcome of one round for one participant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Price charged by the rival firm.
    pub rival_price: Option<f64>,
    /// Share of the market served.
    pub market_share: Option<MarketShare>,
    /// Profit, rounded to one decimal.
    pub profit: Option<Decimal>,
}

impl RoundRecord {
    pub fn is_recorded(&self) -> bool {
        self.profit.is_some()
    }
}

/// Per-participant progress and history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 0 = unassigned, k in 1..=10 = awaiting round k, 11 = finished.
    pub current_round: u8,
    /// Sum of recorded round profits.
    pub total_profit: Decimal,
    /// One record per round; index 0 is round 1.
    pub rounds: Vec<RoundRecord>,
}

impl Default for LedgerEntry {
    fn default() -> Self {
        Self {
            current_round: 0,
            total_profit: Decimal::ZERO,
            rounds: vec![RoundRecord::default(); MAX_ROUNDS as usize],
        }
    }
}

impl LedgerEntry {
    /// Record for a 1-based round number.
    pub fn record(&self, round: u8) -> Option<&RoundRecord> {
        round
            .checked_sub(1)
            .and_then(|i| self.rounds.get(i as usize))
    }

    pub fn is_active(&self) -> bool {
        self.current_round > 0
    }

    pub fn is_finished(&self) -> bool {
        self.current_round >= FINISHED_ROUND
    }
}

/// Which pricing game is being played.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Homogeneous-goods Bertrand duopoly, winner takes all.
    PriceCompetition,
    /// Hotelling linear city with firms at both ends.
    SpatialCompetition,
}

impl FromStr for GameMode {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bertrand" | "price" | "price-competition" => Ok(GameMode::PriceCompetition),
            "hotelling" | "spatial" | "spatial-competition" => Ok(GameMode::SpatialCompetition),
            other => Err(LabError::Configuration(format!("unknown game mode '{other}'"))),
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::PriceCompetition => f.write_str("bertrand"),
            GameMode::SpatialCompetition => f.write_str("hotelling"),
        }
    }
}

/// Parameters of the winner-take-all price game.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceCompetitionConfig {
    /// Demand slope (alpha): share = 1 - slope * p / 100.
    pub slope: f64,
    /// Marginal cost.
    pub cost: f64,
}

impl Default for PriceCompetitionConfig {
    fn default() -> Self {
        Self {
            slope: 1.0,
            cost: 0.0,
        }
    }
}

/// Parameters of the linear-city game.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialCompetitionConfig {
    /// Transport cost per unit of distance (t).
    pub transport: f64,
    /// Marginal cost (c).
    pub cost: f64,
    /// Consumer reservation value (v).
    pub valuation: f64,
}

impl SpatialCompetitionConfig {
    /// High transport cost: NE 100, monopoly 150.
    pub const HIGH_TRANSPORT: Self = Self {
        transport: 1.0,
        cost: 0.0,
        valuation: 200.0,
    };
    /// Low transport cost: NE 50, monopoly 175.
    pub const LOW_TRANSPORT: Self = Self {
        transport: 0.5,
        cost: 0.0,
        valuation: 200.0,
    };
    /// Defaults offered when the operator picks a custom setup.
    pub const CUSTOM_DEFAULT: Self = Self {
        transport: 1.0,
        cost: 0.0,
        valuation: 4.0,
    };
}

/// Named spatial setups offered at game start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpatialPreset {
    HighTransport,
    LowTransport,
    Custom,
}

/// Game configuration, fixed for the duration of a game.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameConfig {
    PriceCompetition(PriceCompetitionConfig),
    SpatialCompetition(SpatialCompetitionConfig),
}

impl GameConfig {
    pub fn mode(&self) -> GameMode {
        match self {
            GameConfig::PriceCompetition(_) => GameMode::PriceCompetition,
            GameConfig::SpatialCompetition(_) => GameMode::SpatialCompetition,
        }
    }

    /// Marginal cost shared by both firms.
    pub fn cost(&self) -> f64 {
        match self {
            GameConfig::PriceCompetition(p) => p.cost,
            GameConfig::SpatialCompetition(s) => s.cost,
        }
    }

    /// Short tag used in output file names, e.g. `hotelling_t1_c0_v200`.
    pub fn abbrev(&self) -> String {
        match self {
            GameConfig::PriceCompetition(p) => format!("bertrand_alpha{}_c{}", p.slope, p.cost),
            GameConfig::SpatialCompetition(s) => {
                format!("hotelling_t{}_c{}_v{}", s.transport, s.cost, s.valuation)
            }
        }
    }
}

/// Horizontal reference line drawn on price charts, e.g. the Nash equilibrium.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePrice {
    pub label: String,
    pub price: f64,
}

/// Everything chosen at game start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSetup {
    pub config: GameConfig,
    #[serde(default)]
    pub reference_prices: Vec<ReferencePrice>,
}

/// Submitted prices, one optional value per participant and round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSheet {
    rows: BTreeMap<ParticipantId, Vec<Option<f64>>>,
}

impl PriceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant row; values beyond round 10 are ignored and
    /// missing rounds are padded with `None`.
    pub fn insert_row(&mut self, id: ParticipantId, prices: Vec<Option<f64>>) {
        let mut row: Vec<Option<f64>> = prices
            .into_iter()
            .take(MAX_ROUNDS as usize)
            .map(|p| p.filter(|v| is_valid_price(*v)))
            .collect();
        row.resize(MAX_ROUNDS as usize, None);
        self.rows.insert(id, row);
    }

    /// Price submitted by `id` for a 1-based round.
    pub fn price(&self, id: &ParticipantId, round: u8) -> Option<f64> {
        let idx = round.checked_sub(1)? as usize;
        self.rows.get(id).and_then(|r| r.get(idx).copied().flatten())
    }

    /// Fill a cell, creating the row when needed.
    pub fn set_price(&mut self, id: &ParticipantId, round: u8, price: f64) {
        let Some(idx) = round.checked_sub(1).map(usize::from) else {
            return;
        };
        if idx >= MAX_ROUNDS as usize || !is_valid_price(price) {
            return;
        }
        let row = self
            .rows
            .entry(id.clone())
            .or_insert_with(|| vec![None; MAX_ROUNDS as usize]);
        row[idx] = Some(price);
    }

    /// All submitted prices for a round, in participant-id order.
    pub fn round_prices(&self, round: u8) -> Vec<f64> {
        self.rows
            .keys()
            .filter_map(|id| self.price(id, round))
            .collect()
    }

    /// Participants (in the given order) that submitted a price for `round`.
    pub fn submitted(&self, ids: &[ParticipantId], round: u8) -> Vec<ParticipantId> {
        ids.iter()
            .filter(|id| self.price(id, round).is_some())
            .cloned()
            .collect()
    }
}

/// Finite and no larger than [`MAX_PRICE`] in magnitude.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price.abs() <= MAX_PRICE
}

/// Parse a cell value as a price. Anything that is not a valid price is absent.
pub fn parse_price(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| is_valid_price(*v))
}

fn check_finite(name: &str, value: f64) -> Result<(), LabError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LabError::Configuration(format!("{name} must be finite")))
    }
}

fn check_price_scale(name: &str, value: f64) -> Result<(), LabError> {
    check_finite(name, value)?;
    if value.abs() > MAX_PRICE {
        return Err(LabError::Configuration(format!(
            "{name} must be at most {MAX_PRICE}"
        )));
    }
    Ok(())
}

/// Validate game parameters before any state is created.
pub fn validate_config(config: &GameConfig) -> Result<(), LabError> {
    match config {
        GameConfig::PriceCompetition(p) => {
            check_finite("slope", p.slope)?;
            check_price_scale("cost", p.cost)?;
            if p.slope < 0.0 {
                return Err(LabError::Configuration("slope must be >= 0".into()));
            }
            if p.cost < 0.0 {
                return Err(LabError::Configuration("cost must be >= 0".into()));
            }
        }
        GameConfig::SpatialCompetition(s) => {
            check_finite("transport cost", s.transport)?;
            check_price_scale("cost", s.cost)?;
            check_price_scale("valuation", s.valuation)?;
            if s.transport <= 0.0 {
                return Err(LabError::Configuration("transport cost must be > 0".into()));
            }
            if s.cost < 0.0 {
                return Err(LabError::Configuration("cost must be >= 0".into()));
            }
        }
    }
    Ok(())
}

/// Validate a full setup, including its reference lines.
pub fn validate_setup(setup: &GameSetup) -> Result<(), LabError> {
    validate_config(&setup.config)?;
    for line in &setup.reference_prices {
        if line.label.trim().is_empty() {
            return Err(LabError::Configuration("reference price without label".into()));
        }
        check_finite(&line.label, line.price)?;
    }
    Ok(())
}
