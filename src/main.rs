//! # RustEd BSP
//!
//! Command line node builder. Loads a WAD, builds the BSP tree of each
//! requested level and logs the resulting statistics and map problems.
//!
//! ```text
//! rust_ed_bsp <file.wad> [LEVEL...] [--config cfg.json]
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) to see the output.

use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::process;
use std::sync::Arc;

use log::{error, info};

use rust_ed_bsp::bsp::BspLevel;
use rust_ed_bsp::config::BspConfig;
use rust_ed_bsp::document::Document;

struct Args {
    wad: String,
    levels: Vec<String>,
    config: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut wad = None;
    let mut levels = Vec::new();
    let mut config = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config = Some(args.next().ok_or("--config needs a file name")?);
            }
            _ if wad.is_none() => wad = Some(arg),
            _ => levels.push(arg.to_ascii_uppercase()),
        }
    }

    let wad = wad.ok_or("usage: rust_ed_bsp <file.wad> [LEVEL...] [--config cfg.json]")?;
    Ok(Args { wad, levels, config })
}

fn build_level(doc: &mut Document, name: &str, config: &BspConfig) -> Result<(), Box<dyn Error>> {
    doc.select_level(name)?;
    // The session shares the document; it is dropped before the next level
    // is loaded into it.
    let shared = Arc::new(std::mem::take(doc));
    let mut level = BspLevel::new(Arc::clone(&shared), config.clone());
    let result = level.build();

    if result.is_ok() {
        let report = level.report();
        info!(
            "{}: {} nodes, {} leafs, {} segments, {} vertices",
            name,
            level.num_nodes(),
            level.num_leafs(),
            level.num_segments(),
            level.num_vertices()
        );
        info!(
            "{}: {} windows, {} unclosed sectors, {} mismatches, {} unclosed leafs, {} migrants",
            name,
            report.window_effects.len(),
            report.unclosed_sectors.len(),
            report.sector_mismatches.len(),
            report.unclosed_leafs.len(),
            report.migrant_segments.len()
        );
    }

    drop(level);
    *doc = Arc::try_unwrap(shared).map_err(|_| "document still shared after build")?;
    result.map_err(|e| format!("{}: {}", name, e).into())
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => BspConfig::load(path)?,
        None => BspConfig::default(),
    };

    let mut doc = Document::new();
    let mut reader = BufReader::new(File::open(&args.wad)?);
    doc.load_wad(&mut reader)?;

    let levels = if args.levels.is_empty() { doc.available_levels() } else { args.levels.clone() };
    info!("Building {} level(s) from {}", levels.len(), args.wad);

    let mut failed = 0;
    for name in &levels {
        if let Err(e) = build_level(&mut doc, name, &config) {
            error!("Node build failed: {}", e);
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} level(s) failed", failed, levels.len()).into());
    }
    Ok(())
}

fn main() {
    // Initialize logging.
    env_logger::init();
    info!("RustEd BSP starting...");

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
    info!("RustEd BSP exiting.");
}
