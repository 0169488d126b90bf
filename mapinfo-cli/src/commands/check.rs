use anyhow::{bail, Context, Result};
use mapinfo::config::QueryKind;
use mapinfo::sql::{bind_placeholders, structured_sql};
use mapinfo::{ConfigStore, Position, Srid};
use std::path::PathBuf;

pub async fn run(config_dir: PathBuf, tenant: &str) -> Result<()> {
    let store = ConfigStore::new(&config_dir, 1, None);
    let path = store.config_path(tenant)?;
    let config = store
        .get(tenant)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    println!("Configuration: {}", path.display());
    println!("Queries:       {}", config.queries().len());

    // Placeholders are checked against an arbitrary position.
    let position = Position::new(0.0, 0.0);
    let srid = Srid::new(4326).context("invalid SRID")?;
    let mut failures = 0;

    for (index, query) in config.queries().iter().enumerate() {
        let (mode, sql) = match &query.kind {
            QueryKind::Structured(structured) => ("structured", structured_sql(structured)),
            QueryKind::Raw { sql } => ("raw", sql.clone()),
        };

        println!();
        println!("[{}] {} {:?}", index, mode, query.title.labels());
        println!("    {}", sql);

        if let Err(e) = bind_placeholders(&sql, position, srid) {
            println!("    error: {}", e);
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} queries are invalid", failures, config.queries().len());
    }

    Ok(())
}
