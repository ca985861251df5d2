//! Game parameters, from a YAML file or from the operator.

use crate::prompt::Prompter;
use anyhow::{Context, Result};
use lab_core::{
    validate_setup, GameConfig, GameMode, GameSetup, PriceCompetitionConfig,
    SpatialCompetitionConfig, SpatialPreset,
};
use std::io::{BufRead, Write};
use std::path::Path;

/// Load a `GameSetup` YAML file. Reference lines default to the ones of the mode.
///
/// Example:
/// SpatialCompetition:
///   transport: 0.5
///   cost: 0
///   valuation: 200
pub fn load_setup(path: &Path) -> Result<GameSetup> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading game config {}", path.display()))?;
    let mut setup: GameSetup = match serde_yaml::from_str::<GameSetup>(&text) {
        Ok(setup) => setup,
        Err(_) => {
            let config: GameConfig = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing game config {}", path.display()))?;
            GameSetup {
                config,
                reference_prices: Vec::new(),
            }
        }
    };
    if setup.reference_prices.is_empty() {
        setup.reference_prices = lab_econ::reference_prices(&setup.config, None);
    }
    validate_setup(&setup)?;
    Ok(setup)
}

/// Ask for the mode and its parameters.
pub fn prompt_setup<R: BufRead, W: Write>(p: &mut Prompter<R, W>) -> Result<GameSetup> {
    let mode = loop {
        let answer = p.ask("Game mode, bertrand or hotelling [bertrand]: ")?;
        if answer.is_empty() {
            break GameMode::PriceCompetition;
        }
        match answer.parse::<GameMode>() {
            Ok(mode) => break mode,
            Err(e) => writeln!(p.out(), "{e}")?,
        }
    };

    let (config, preset) = match mode {
        GameMode::PriceCompetition => {
            let defaults = PriceCompetitionConfig::default();
            let slope = p.number("Demand slope (alpha)", defaults.slope)?;
            let cost = p.number("Marginal cost (c)", defaults.cost)?;
            (
                GameConfig::PriceCompetition(PriceCompetitionConfig { slope, cost }),
                None,
            )
        }
        GameMode::SpatialCompetition => {
            let presets = [
                "high transport cost (t=1, c=0, v=200)",
                "low transport cost (t=0.5, c=0, v=200)",
                "custom",
            ];
            let (preset, config) = match p.choose("Hotelling setup", &presets, 0)? {
                0 => (
                    SpatialPreset::HighTransport,
                    SpatialCompetitionConfig::HIGH_TRANSPORT,
                ),
                1 => (
                    SpatialPreset::LowTransport,
                    SpatialCompetitionConfig::LOW_TRANSPORT,
                ),
                _ => {
                    let d = SpatialCompetitionConfig::CUSTOM_DEFAULT;
                    let transport = p.number("Transport cost (t)", d.transport)?;
                    let cost = p.number("Marginal cost (c)", d.cost)?;
                    let valuation = p.number("Consumer valuation (v)", d.valuation)?;
                    (
                        SpatialPreset::Custom,
                        SpatialCompetitionConfig {
                            transport,
                            cost,
                            valuation,
                        },
                    )
                }
            };
            (GameConfig::SpatialCompetition(config), Some(preset))
        }
    };

    let setup = GameSetup {
        reference_prices: lab_econ::reference_prices(&config, preset),
        config,
    };
    validate_setup(&setup)?;
    Ok(setup)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> Result<GameSetup> {
        let mut p = Prompter::new(input.as_bytes(), Vec::new());
        prompt_setup(&mut p)
    }

    #[test]
    fn bertrand_defaults() {
        let setup = run("\n\n\n").unwrap();
        assert_eq!(
            setup.config,
            GameConfig::PriceCompetition(PriceCompetitionConfig::default())
        );
        assert_eq!(setup.reference_prices.len(), 2);
        assert_eq!(setup.reference_prices[1].price, 50.0);
    }

    #[test]
    fn hotelling_presets_and_custom() {
        let low = run("hotelling\n2\n").unwrap();
        assert_eq!(
            low.config,
            GameConfig::SpatialCompetition(SpatialCompetitionConfig::LOW_TRANSPORT)
        );
        assert_eq!(low.reference_prices[1].price, 175.0);

        let custom = run("hotelling\n3\n\n\n\n").unwrap();
        assert_eq!(
            custom.config,
            GameConfig::SpatialCompetition(SpatialCompetitionConfig::CUSTOM_DEFAULT)
        );
        assert_eq!(custom.reference_prices.len(), 1);
    }

    #[test]
    fn unknown_mode_is_asked_again() {
        let setup = run("cournot\nbertrand\n2\n10\n").unwrap();
        assert_eq!(
            setup.config,
            GameConfig::PriceCompetition(PriceCompetitionConfig {
                slope: 2.0,
                cost: 10.0
            })
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(run("hotelling\ncustom\n0\n\n\n").is_err());
    }

    #[test]
    fn config_file_accepts_bare_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.yaml");
        std::fs::write(
            &path,
            "SpatialCompetition:\n  transport: 0.5\n  cost: 0\n  valuation: 200\n",
        )
        .unwrap();
        let setup = load_setup(&path).unwrap();
        assert_eq!(setup.config.abbrev(), "hotelling_t0.5_c0_v200");
        assert_eq!(setup.reference_prices.len(), 1);

        std::fs::write(
            &path,
            "config:\n  PriceCompetition:\n    slope: 1\n    cost: 5\n\
             reference_prices:\n  - label: NE\n    price: 5\n",
        )
        .unwrap();
        let setup = load_setup(&path).unwrap();
        assert_eq!(setup.reference_prices.len(), 1);
        assert_eq!(setup.config.cost(), 5.0);
    }
}
