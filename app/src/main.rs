mod cli;
mod report;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use gearsim::util::timing::measure_debug;
use gearsim::{load_graph, Compiler, EntityId, GearsimConfig, MechanismGraph, MemoryBackend};
use log::info;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match &cli.config {
        Some(path) => GearsimConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GearsimConfig::load(),
    };

    match cli.command {
        Commands::Compile {
            graph,
            entity,
            frame,
            json,
        } => {
            let (backend, _) = compile(&config, &graph, &entity, frame)?;
            let rules = backend.rules();
            if json {
                println!("{}", report::rules_json(&rules)?);
            } else {
                print!("{}", report::rules_text(&rules));
            }
        }
        Commands::Simulate {
            graph,
            entity,
            frames,
            start,
        } => {
            let (first, end) = frame_span(start, frames)?;
            let (mut backend, graph) = compile(&config, &graph, &entity, first - 1)?;
            let targets = report::gear_targets(&graph);
            println!("{}", report::frame_header(&targets));
            for frame in first..end {
                backend
                    .evaluate_frame(frame)
                    .with_context(|| format!("Evaluation failed at frame {}", frame))?;
                println!("{}", report::frame_row(frame, &targets, &backend));
            }
        }
    }

    Ok(())
}

/// Half-open range of evaluated frames. The compile runs one frame before
/// `start`, so both ends must stay inside `i64`.
fn frame_span(start: i64, frames: u32) -> Result<(i64, i64)> {
    start
        .checked_sub(1)
        .and_then(|_| start.checked_add(i64::from(frames)))
        .map(|end| (start, end))
        .ok_or_else(|| anyhow!("Frame range starting at {} is out of bounds", start))
}

fn compile(
    config: &GearsimConfig,
    path: &Path,
    entity: &str,
    frame: i64,
) -> Result<(MemoryBackend, MechanismGraph)> {
    let mut graph =
        load_graph(path).with_context(|| format!("Failed to read graph {}", path.display()))?;
    let entity = EntityId::new(entity);
    let mut backend = MemoryBackend::with_max_expression_length(config.host.max_expression_length);
    let compiler = Compiler::new(config.compiler.clone());

    measure_debug("Compile", || {
        compiler.compile(&mut backend, &entity, &mut graph, frame)
    })
    .with_context(|| format!("Failed to compile {} onto {}", path.display(), entity))?;

    info!(
        "{} rules on {} ({} nodes)",
        backend.rules().len(),
        entity,
        graph.len()
    );
    Ok((backend, graph))
}
