use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mwd_cloud::{Config, Session};

const USAGE: &str = "usage: mwd-cloud <data.csv> [config.json]";

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let Some(data_path) = args.next() else {
        bail!(USAGE);
    };
    let config = match args.next() {
        Some(path) => Config::from_path(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if args.next().is_some() {
        bail!(USAGE);
    }

    let mut session = Session::open_path(&data_path, &config)
        .with_context(|| format!("opening {}", data_path.display()))?;
    log::info!(
        "ingesting {} in chunks of {} records",
        data_path.display(),
        config.chunk_size
    );

    let summary = session
        .load_all()
        .with_context(|| format!("reading {}", data_path.display()))?;
    log::info!(
        "{} points from {} records, {} visible after filtering",
        summary.accepted,
        summary.records,
        session.visible.len()
    );

    let json = serde_json::to_string_pretty(&session.summary()).context("encoding summary")?;
    println!("{json}");
    Ok(())
}
