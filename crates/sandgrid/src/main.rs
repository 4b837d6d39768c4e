//! Sandgrid - headless runner
//!
//! Builds a grid from a RON config (or the built-in demo), generates noise terrain over
//! a rectangle of chunks and steps it, logging a summary as it goes.

mod terrain;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use glam::IVec2;
use sandgrid_core::simulation::{CHUNK_SIZE, SideEffectToken};
use sandgrid_core::world::IdleEviction;
use sandgrid_core::{Grid, GridConfig, StepSummary};

use terrain::{TerrainMaterials, TerrainPass};

const DEMO_CONFIG: &str = r#"
(
    seed: 42,
    materials: [
        (name: "empty"),
        (name: "stone", collision: Solid, density: 100),
        (name: "sand", collision: Solid, density: 10, vertical_movement: 2, noise_darken_max: 3),
        (
            name: "water",
            tags: ["liquid"],
            collision: Liquid,
            density: 5,
            vertical_movement: 2,
            horizontal_movement: 4,
            horizontal_movement_start_chance: 1.0,
            horizontal_movement_stop_chance: 0.02,
            dissipate_on_horizontal_movement: true,
            can_reverse_horizontal_movement: true,
        ),
        (name: "fire", density: 1, vertical_movement: -1, horizontal_movement_start_chance: 0.3),
        (
            name: "steam",
            density: 2,
            vertical_movement: -1,
            horizontal_movement: 2,
            horizontal_movement_start_chance: 0.5,
            horizontal_movement_stop_chance: 0.3,
            dissipate_on_horizontal_movement: true,
            dissipation_chance: 0.05,
        ),
    ],
    reactions: [
        (inputs: ("liquid", "fire"), outputs: ("steam", "empty"), side_effect: Some(1)),
        (inputs: ("sand", "fire"), outputs: ("sand", "empty"), probability: 0.1),
    ],
)
"#;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON grid config, the built-in demo is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the demo config to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(long, default_value = "300")]
    ticks: u32,

    /// World width in chunks
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(i32).range(1..))]
    width: i32,

    /// World height in chunks
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(i32).range(1..))]
    height: i32,

    /// Override the config seed
    #[arg(long)]
    seed: Option<u64>,

    /// Step bands on the current thread only
    #[arg(long)]
    serial: bool,

    /// Skip terrain generation
    #[arg(long)]
    no_terrain: bool,

    /// Drop chunks idle for this many ticks
    #[arg(long)]
    evict_idle: Option<i64>,

    /// Print the world as text every N ticks (0 disables)
    #[arg(long, default_value = "0")]
    preview_every: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(path) = &args.write_config {
        let config = GridConfig::from_ron_str(DEMO_CONFIG)?;
        std::fs::write(path, config.to_ron_string()?)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote demo config to {}", path.display());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => GridConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GridConfig::from_ron_str(DEMO_CONFIG)?,
    };

    let mut grid = Grid::from_config(&config)?;
    if let Some(seed) = args.seed {
        grid.set_seed(seed);
    }
    if args.serial {
        grid.set_parallel(false);
    }
    if let Some(max_idle_ticks) = args.evict_idle {
        grid.set_eviction_policy(IdleEviction { max_idle_ticks });
    }

    let hisses = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&hisses);
    grid.set_side_effect_handler(move |coord: IVec2, token: SideEffectToken| {
        log::trace!("Side effect {} at {}", token.0, coord);
        counter.fetch_add(1, Ordering::Relaxed);
    });

    if !args.no_terrain {
        add_terrain(&mut grid, args.height);
    }

    let origin = IVec2::new(-args.width / 2, 0);
    for cy in 0..args.height {
        for cx in 0..args.width {
            grid.try_create_chunk(origin + IVec2::new(cx, cy));
        }
    }
    log::info!(
        "Created {} chunks ({}x{}), seed {}",
        grid.chunk_manager().len(),
        args.width,
        args.height,
        grid.seed()
    );

    let world_min = origin * CHUNK_SIZE as i32;
    let world_size = IVec2::new(args.width, args.height) * CHUNK_SIZE as i32;
    ignite(&mut grid, world_min, world_size);

    let started = Instant::now();
    let mut total = StepSummary::default();
    for _ in 0..args.ticks {
        let summary = grid.step();
        total.merge(&summary);

        if summary.tick % 50 == 0 {
            log::info!(
                "Tick {}: {} chunks stepped, {} moves, {} reactions",
                summary.tick,
                summary.chunks_stepped,
                summary.cells_moved,
                summary.reactions
            );
        }
        if args.preview_every > 0 && summary.tick % i64::from(args.preview_every) == 0 {
            print_preview(&grid, world_min, world_size);
        }
    }

    let elapsed = started.elapsed();
    log::info!(
        "Simulated {} ticks in {:.2?} ({:.2} ms/tick)",
        args.ticks,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / f64::from(args.ticks.max(1))
    );
    log::info!(
        "Totals: {} chunk steps, {} moves, {} reactions, {} dissipations, {} evictions, \
         {} side effects",
        total.chunks_stepped,
        total.cells_moved,
        total.reactions,
        total.dissipations,
        total.chunks_evicted,
        hisses.load(Ordering::Relaxed)
    );

    Ok(())
}

fn add_terrain(grid: &mut Grid, height: i32) {
    let materials = grid.materials();
    let (Some(stone), Some(sand), Some(water)) = (
        materials.find("stone"),
        materials.find("sand"),
        materials.find("water"),
    ) else {
        log::warn!("Config lacks stone, sand or water, skipping terrain");
        return;
    };

    let surface = height * CHUNK_SIZE as i32 / 2;
    let seed = grid.seed();
    grid.add_generation_pass(TerrainPass::new(
        seed,
        TerrainMaterials { stone, sand, water },
        surface,
    ));
}

/// Scatter fire along the top rows so the demo has something to react
fn ignite(grid: &mut Grid, min: IVec2, size: IVec2) {
    let Some(fire) = grid.materials().find("fire") else {
        return;
    };

    let mut rng = grid.static_rng(IVec2::ZERO);
    for _ in 0..size.x / 2 {
        let x = min.x + rng.gen_range_i32(0, size.x);
        let y = min.y + rng.gen_range_i32(0, (size.y / 4).max(1));
        grid.set_material_id(IVec2::new(x, y), fire);
    }
}

fn print_preview(grid: &Grid, min: IVec2, size: IVec2) {
    let glyphs: Vec<char> = grid
        .materials()
        .iter()
        .map(|(id, material)| match id {
            0 => ' ',
            _ => material.name.chars().next().unwrap_or('?'),
        })
        .collect();

    let cells = grid.cell_buffer(min, size, true);
    let mut text = String::with_capacity(cells.len() + size.y as usize);
    for row in cells.chunks(size.x as usize) {
        text.extend(
            row.iter()
                .map(|&bits| glyphs.get((bits & 0xFFF) as usize).copied().unwrap_or('?')),
        );
        text.push('\n');
    }
    println!("{text}");
}
