//! Run a single plugin from the command line
//!
//! ```text
//! cargo run --example run_plugin -- <PluginName> '<params JSON>' [target_dir]
//! ```
//!
//! Filters print their values, one per line. Input connectors write into
//! `target_dir` (default `./output`). Set `GEOEDF_CONFIG` to a JSON config
//! file to override service endpoints or reference shapefiles, and
//! `RUST_LOG` to control log output (e.g. `RUST_LOG=geoedf_connectors=debug`).
//!
//! Examples:
//!
//! ```text
//! cargo run --example run_plugin -- GeoRangeFilter '{"extent": "38,40,-87,-85"}'
//! cargo run --example run_plugin -- WQPInput '{"site_id": "USGS-03335500"}' wqp
//! ```

use geoedf_connectors::{Config, Params, available_filters, build_filter, build_input};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(name), Some(params)) = (args.next(), args.next()) else {
        eprintln!("usage: run_plugin <PluginName> '<params JSON>' [target_dir]");
        std::process::exit(2);
    };
    let target = PathBuf::from(args.next().unwrap_or_else(|| "output".to_string()));

    let config = match std::env::var_os("GEOEDF_CONFIG") {
        Some(path) => Config::from_file(PathBuf::from(path).as_path())?,
        None => Config::default(),
    };
    let params = Params::from_json(&params)?;

    if available_filters().contains(&name.as_str()) {
        let mut filter = build_filter(&name, &params, &config)?;
        filter.filter().await?;
        for value in filter.values() {
            println!("{}", value);
        }
    } else {
        let mut input = build_input(&name, &params, &config)?;
        input.set_target_path(target.clone());
        input.get().await?;
        println!("✓ {} wrote into {}", name, target.display());
    }

    Ok(())
}
