//! Print the SQL each query of a tenant configuration would run.
//!
//! Run with: cargo run --example render_sql -- /path/to/mapinfoConfig.json 950820,6003926 EPSG:3857

use mapinfo::params::{parse_crs, parse_position};
use mapinfo::sql::build_query;
use mapinfo::{MapInfoError, TenantConfig};
use std::env;

fn main() -> Result<(), MapInfoError> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [path, pos, crs] = args.as_slice() else {
        eprintln!("Usage: cargo run --example render_sql -- <mapinfoConfig.json> <x,y> <EPSG:code>");
        std::process::exit(1);
    };

    let config = TenantConfig::from_json(&std::fs::read_to_string(path)?)?;
    let position = parse_position(pos)?;
    let srid = parse_crs(crs)?;

    for (index, query) in config.queries().iter().enumerate() {
        let bound = build_query(&query.kind, position, srid)?;
        println!("-- query {} ({:?})", index, query.title.labels());
        println!("{}", bound.sql);
        let params: Vec<String> = bound.params.iter().map(ToString::to_string).collect();
        println!("-- params: [{}]", params.join(", "));
        println!();
    }

    Ok(())
}
