#![deny(warnings)]

//! Operator CLI: register sections, set up a game and run it round by round.

mod prompt;
mod report;
mod setup;

use anyhow::{bail, Context, Result};
use lab_core::LabError;
use lab_runtime::{AdvanceMode, GameSession};
use persistence::{SeriesExporter, SqlitePool, Workbook};
use prompt::Prompter;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TOP_N: usize = 5;

#[derive(Debug, Default, PartialEq)]
struct Args {
    register: Option<(String, String)>,
    db_url: Option<String>,
    seed: Option<u64>,
    config: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    resume: bool,
    version: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--register" => {
                let (Some(name), Some(sheet)) = (it.next(), it.next()) else {
                    bail!("--register needs a section name and a sheet path");
                };
                parsed.register = Some((name, sheet));
            }
            "--db" => parsed.db_url = it.next(),
            "--seed" => {
                let raw = it.next().unwrap_or_default();
                parsed.seed = Some(raw.parse().with_context(|| format!("bad seed '{raw}'"))?);
            }
            "--config" => parsed.config = it.next().map(PathBuf::from),
            "--out" => parsed.out_dir = it.next().map(PathBuf::from),
            "--resume" => parsed.resume = true,
            "--version" => parsed.version = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!(
            "pricing-lab {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let url = args
        .db_url
        .clone()
        .unwrap_or_else(|| persistence::default_sqlite_url().to_string());
    persistence::ensure_db_dir(&url)?;
    let pool = rt.block_on(persistence::init_db(&url))?;

    if let Some((name, sheet)) = &args.register {
        rt.block_on(persistence::register_section(&pool, name, sheet))?;
        if Workbook::open(sheet).is_err() {
            println!("Registered {name}. Note: {sheet} has no pricing.yaml yet.");
        } else {
            println!("Registered {name} -> {sheet}");
        }
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut p = Prompter::new(stdin.lock(), std::io::stdout());
    run(&rt, &pool, &args, &mut p)
}

fn run<R: BufRead, W: Write>(
    rt: &Runtime,
    pool: &SqlitePool,
    args: &Args,
    p: &mut Prompter<R, W>,
) -> Result<()> {
    let (mut book, mut session) = begin(rt, pool, args, p)?;
    play(rt, pool, args, p, &mut book, &mut session)
}

/// Pick a section and start a new game, or resume its last save.
fn begin<R: BufRead, W: Write>(
    rt: &Runtime,
    pool: &SqlitePool,
    args: &Args,
    p: &mut Prompter<R, W>,
) -> Result<(Workbook, GameSession)> {
    let sections = rt.block_on(persistence::list_sections(pool))?;
    if sections.is_empty() {
        bail!("no sections registered; use --register NAME SHEET first");
    }
    let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
    let section = &sections[p.choose("Choose a section", &names, 0)?];
    let mut book = Workbook::open(&section.sheet_id)?;
    info!(section = %section.name, sheet = %section.sheet_id, "section selected");

    let session = if args.resume {
        let Some(snapshot) =
            rt.block_on(persistence::load_latest_snapshot(pool, &section.name))?
        else {
            bail!("no saved game for section {}", section.name);
        };
        let session = GameSession::restore(snapshot)?;
        writeln!(
            p.out(),
            "Resumed {} at round {}",
            session.label(),
            session.binding_round()
        )?;
        session
    } else {
        let setup = match &args.config {
            Some(path) => setup::load_setup(path)?,
            None => setup::prompt_setup(p)?,
        };
        let seed = args
            .seed
            .unwrap_or_else(|| chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64);
        let today = chrono::Local::now().date_naive();
        GameSession::start(&section.name, setup, &mut book, seed, today)?
    };
    save(rt, pool, &session, "start");
    Ok((book, session))
}

/// Menu loop until the game ends, then publish results.
fn play<R: BufRead, W: Write>(
    rt: &Runtime,
    pool: &SqlitePool,
    args: &Args,
    p: &mut Prompter<R, W>,
    book: &mut Workbook,
    session: &mut GameSession,
) -> Result<()> {
    let menu = [
        "soft advance",
        "hard advance",
        "show rankings",
        "show pairs",
        "end game",
    ];
    loop {
        if session.is_finished() {
            writeln!(p.out(), "All rounds have been completed.")?;
            break;
        }
        let header = format!(
            "\n[{}] - Round {} - Binding Round {}\n--------",
            session.section(),
            session.ticks() + 1,
            session.binding_round()
        );
        match p.menu(&header, &menu)? {
            choice @ (0 | 1) => {
                let mode = if choice == 0 {
                    AdvanceMode::Soft
                } else {
                    AdvanceMode::Hard
                };
                match session.tick(book, mode) {
                    Ok(report) => {
                        write!(p.out(), "{}", report::tick_summary(session, &report))?;
                        save(rt, pool, session, "tick");
                    }
                    Err(e @ (LabError::ExternalIo(_) | LabError::MissingData { .. })) => {
                        warn!(error = %e, "advance failed");
                        writeln!(p.out(), "Advance failed: {e}. Fix it and try again.")?;
                        save(rt, pool, session, "tick pending");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            2 => write!(p.out(), "{}", report::rankings(session, TOP_N))?,
            3 => write!(p.out(), "{}", report::pairings(session))?,
            _ => {
                if p.confirm("End the game and publish results?")? {
                    break;
                }
            }
        }
    }

    let out_dir = args.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut exporter = SeriesExporter::new(&out_dir);
    let results = session.finish(book, &mut exporter)?;
    write!(p.out(), "{}", report::final_results(&results))?;
    writeln!(p.out(), "Charts written: {}", exporter.written().len())?;
    if p.confirm("Save rankings?")? {
        let path = persistence::export_rankings(
            &out_dir,
            session.section(),
            &session.label(),
            &session.standings(),
            &session.pair_standings(),
        )?;
        writeln!(p.out(), "Rankings saved to {}", path.display())?;
    }
    save(rt, pool, session, "finished");
    Ok(())
}

/// Store a save game. Failures are logged and the game goes on.
fn save(rt: &Runtime, pool: &SqlitePool, session: &GameSession, note: &str) {
    let snapshot = session.snapshot();
    if let Err(e) = rt.block_on(persistence::save_snapshot(pool, &snapshot, Some(note))) {
        warn!(error = %e, "could not store save game");
    }
}
