#![deny(warnings)]

use persistence::{default_sqlite_url, ensure_db_dir, init_db, list_sections};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    ensure_db_dir(&url)?;
    let pool = init_db(&url).await?;
    let sections = list_sections(&pool).await?;
    println!("DB migrated at {} ({} sections registered)", url, sections.len());
    Ok(())
}
