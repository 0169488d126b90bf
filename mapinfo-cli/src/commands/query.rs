use anyhow::{bail, Context, Result};
use mapinfo::{InfoEntry, MapInfoError, MapInfoServiceBuilder};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Serialize)]
struct LookupResponse<'a> {
    tenant: &'a str,
    pos: &'a str,
    crs: &'a str,
    results: Vec<InfoEntry>,
}

pub async fn run(
    config_dir: PathBuf,
    query_timeout: Option<u64>,
    tenant: &str,
    pos: &str,
    crs: &str,
    json: bool,
) -> Result<()> {
    let mut builder = MapInfoServiceBuilder::new(&config_dir).cache_size(1);
    if let Some(secs) = query_timeout {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }
    let service = builder.build();

    let results = match service.lookup(tenant, Some(pos), Some(crs)).await {
        Ok(results) => results,
        Err(e) if e.is_parameter_error() => bail!("{e}"),
        Err(e @ MapInfoError::TenantNotFound { .. }) => {
            return Err(e).context("Use --config-dir or set MAPINFO_CONFIG_PATH")
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load configuration of {tenant:?}"))
        }
    };

    if json {
        let response = LookupResponse {
            tenant,
            pos,
            crs,
            results,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else if results.is_empty() {
        println!("no features");
    } else {
        for entry in &results {
            println!("{}: {}", entry.title(), display_value(entry.value()));
        }
    }

    Ok(())
}

/// Strings are printed without JSON quotes.
fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
