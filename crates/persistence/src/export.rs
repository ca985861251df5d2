//! JSON exports of the end-of-game charts and rankings.

use crate::PersistenceError;
use lab_core::{LabError, ReferencePrice};
use lab_runtime::{PairSeries, PairStanding, PlotData, PlotRenderer, RoundAverage, Standing};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Keep names usable as a single path component.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

#[derive(Serialize)]
struct PairChart<'a> {
    label: &'a str,
    pair: &'a PairSeries,
    reference_prices: &'a [ReferencePrice],
}

#[derive(Serialize)]
struct AverageChart<'a> {
    label: &'a str,
    average_prices: &'a [RoundAverage],
    reference_prices: &'a [ReferencePrice],
}

/// Writes chart series as JSON under `<root>/plots/<section>/<label>/`.
///
/// Example: plots/Sec_A/bertrand_alpha1_c0_2024-03-01/pair_01.json
#[derive(Clone, Debug)]
pub struct SeriesExporter {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl SeriesExporter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            written: Vec::new(),
        }
    }

    /// Files produced so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn export(&mut self, plot: &PlotData) -> Result<PathBuf, PersistenceError> {
        let dir = self
            .root
            .join("plots")
            .join(file_safe(&plot.section))
            .join(file_safe(&plot.label));
        fs::create_dir_all(&dir)?;
        for pair in &plot.pairs {
            let path = dir.join(format!("pair_{:02}.json", pair.rank));
            write_json(
                &path,
                &PairChart {
                    label: &plot.label,
                    pair,
                    reference_prices: &plot.reference_prices,
                },
            )?;
            self.written.push(path);
        }
        let path = dir.join("average_price.json");
        write_json(
            &path,
            &AverageChart {
                label: &plot.label,
                average_prices: &plot.average_prices,
                reference_prices: &plot.reference_prices,
            },
        )?;
        self.written.push(path);
        Ok(dir)
    }
}

impl PlotRenderer for SeriesExporter {
    fn render(&mut self, plot: &PlotData) -> Result<(), LabError> {
        let dir = self.export(plot)?;
        info!(dir = %dir.display(), pairs = plot.pairs.len(), "charts exported");
        Ok(())
    }
}

#[derive(Serialize)]
struct Rankings<'a> {
    section: &'a str,
    label: &'a str,
    individuals: &'a [Standing],
    pairs: &'a [PairStanding],
}

/// Write the ranking tables to `<root>/game_results/<section>_<label>.json`.
pub fn export_rankings(
    root: impl AsRef<Path>,
    section: &str,
    label: &str,
    individuals: &[Standing],
    pairs: &[PairStanding],
) -> Result<PathBuf, PersistenceError> {
    let dir = root.as_ref().join("game_results");
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}_{}.json", file_safe(section), file_safe(label)));
    write_json(
        &path,
        &Rankings {
            section,
            label,
            individuals,
            pairs,
        },
    )?;
    info!(path = %path.display(), "rankings exported");
    Ok(path)
}
