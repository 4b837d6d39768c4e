//! Integration tests for stepping: movement, reactions and determinism
//!
//! Every grid here is built from a RON config, so these also cover the config path.

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use sandgrid_core::{Grid, GridConfig, StepSummary};

const EMPTY: u16 = 0;
const SAND: u16 = 1;
const WATER: u16 = 2;
const FIRE: u16 = 3;
const STONE: u16 = 4;
const GAS: u16 = 5;

const MATERIALS: &str = r#"
    (
        seed: 1234,
        parallel: false,
        materials: [
            (name: "empty"),
            (name: "sand", density: 10, vertical_movement: 1),
            (
                name: "water",
                density: 5,
                vertical_movement: 1,
                horizontal_movement: 2,
                horizontal_movement_start_chance: 1.0,
                horizontal_movement_stop_chance: 0.0,
            ),
            (name: "fire", density: 1, vertical_movement: -1),
            (name: "stone", density: 100),
            (name: "gas", density: 1, vertical_movement: -1),
        ],
        reactions: [
            (inputs: ("water", "fire"), outputs: ("empty", "empty")),
        ],
    )
"#;

fn grid_from(source: &str) -> Grid {
    let config = GridConfig::from_ron_str(source).unwrap();
    Grid::from_config(&config).unwrap()
}

fn test_grid() -> Grid {
    grid_from(MATERIALS)
}

fn count_material(grid: &Grid, min: IVec2, size: IVec2, material_id: u16) -> usize {
    grid.cell_buffer(min, size, true)
        .iter()
        .filter(|&&bits| bits & 0xFFF == u32::from(material_id))
        .count()
}

// ============================================================================
// Movement
// ============================================================================

#[test]
fn test_sand_falls_one_cell_per_tick() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_material_id(IVec2::new(5, 5), SAND);

    for tick in 1..=10 {
        let summary = grid.step();
        assert_eq!(summary.cells_moved, 1, "tick {tick}");
        assert_eq!(grid.get_material_id(IVec2::new(5, 5 + tick)), SAND);
        assert_eq!(grid.get_material_id(IVec2::new(5, 4 + tick)), EMPTY);
    }
}

#[test]
fn test_sand_rests_on_stone() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 10), IVec2::new(32, 1), STONE);
    grid.set_material_id(IVec2::new(5, 5), SAND);

    for _ in 0..10 {
        grid.step();
    }
    assert_eq!(grid.get_material_id(IVec2::new(5, 9)), SAND);

    // Settled: nothing left to step
    grid.step();
    assert!(grid.step().is_idle());
    assert_eq!(grid.get_chunk_active_rect(IVec2::ZERO).map(|r| r.is_empty()), Some(true));
}

#[test]
fn test_sand_slides_off_a_peak() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 10), IVec2::new(32, 1), STONE);
    grid.set_material_id(IVec2::new(16, 9), STONE);
    grid.set_material_id(IVec2::new(16, 8), SAND);

    grid.step();
    assert_eq!(grid.get_material_id(IVec2::new(16, 8)), EMPTY);
    let left = grid.get_material_id(IVec2::new(15, 9));
    let right = grid.get_material_id(IVec2::new(17, 9));
    assert!(
        (left == SAND) ^ (right == SAND),
        "sand should slide to exactly one side"
    );
}

#[test]
fn test_rising_gas_crosses_chunk_once() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::new(0, 0));
    grid.try_create_chunk(IVec2::new(0, 1));
    grid.set_material_id(IVec2::new(5, 32), GAS);

    // The lower chunk steps first and moves the gas up; the upper chunk must not move it
    // again in the same tick
    grid.step();
    assert_eq!(grid.get_material_id(IVec2::new(5, 32)), EMPTY);
    assert_eq!(grid.get_material_id(IVec2::new(5, 31)), GAS);
    assert_eq!(grid.get_material_id(IVec2::new(5, 30)), EMPTY);

    grid.step();
    assert_eq!(grid.get_material_id(IVec2::new(5, 30)), GAS);
}

#[test]
fn test_falling_sand_crosses_chunk_boundary() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::new(-1, -1));
    grid.try_create_chunk(IVec2::new(-1, 0));
    grid.set_material_id(IVec2::new(-7, -2), SAND);

    for _ in 0..4 {
        grid.step();
    }
    assert_eq!(grid.get_material_id(IVec2::new(-7, 2)), SAND);
    assert_eq!(count_material(&grid, IVec2::new(-32, -32), IVec2::new(32, 64), SAND), 1);
}

#[test]
fn test_water_spreads_in_basin_and_is_conserved() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(4, 20), IVec2::new(24, 1), STONE);
    grid.set_cell_rect(IVec2::new(4, 8), IVec2::new(1, 12), STONE);
    grid.set_cell_rect(IVec2::new(27, 8), IVec2::new(1, 12), STONE);
    grid.set_cell_rect(IVec2::new(16, 10), IVec2::new(1, 5), WATER);

    let area = (IVec2::new(-32, -32), IVec2::new(96, 96));
    for _ in 0..60 {
        grid.step();
        assert_eq!(count_material(&grid, area.0, area.1, WATER), 5);
    }

    let floor = count_material(&grid, IVec2::new(5, 19), IVec2::new(22, 1), WATER);
    assert!(floor >= 2, "water should spread along the floor, {floor} cells on it");
}

#[test]
fn test_horizontal_duplication() {
    let mut grid = grid_from(
        r#"(
            materials: [
                (name: "empty"),
                (name: "stone", density: 100),
                (
                    name: "slime",
                    density: 5,
                    vertical_movement: 1,
                    horizontal_movement_start_chance: 1.0,
                    horizontal_movement_stop_chance: 0.0,
                    horizontal_duplication_chance: 1.0,
                ),
            ],
        )"#,
    );
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 6), IVec2::new(32, 1), 1);
    grid.set_material_id(IVec2::new(16, 5), 2);

    grid.step();
    assert_eq!(count_material(&grid, IVec2::new(0, 5), IVec2::new(32, 1), 2), 2);
}

#[test]
fn test_trapped_surface_cell_dissipates() {
    let mut grid = grid_from(
        r#"(
            materials: [
                (name: "empty"),
                (name: "stone", density: 100),
                (
                    name: "foam",
                    density: 5,
                    vertical_movement: 1,
                    horizontal_movement_start_chance: 1.0,
                    dissipate_on_horizontal_movement: true,
                    dissipation_chance: 1.0,
                ),
            ],
        )"#,
    );
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 6), IVec2::new(32, 1), 1);
    grid.set_material_id(IVec2::new(15, 5), 1);
    grid.set_material_id(IVec2::new(17, 5), 1);
    grid.set_material_id(IVec2::new(16, 5), 2);

    let summary = grid.step();
    assert_eq!(summary.dissipations, 1);
    assert_eq!(grid.get_material_id(IVec2::new(16, 5)), EMPTY);
}

const REVERSING: &str = r#"(
    materials: [
        (name: "empty"),
        (name: "stone", density: 100),
        (
            name: "water",
            density: 5,
            vertical_movement: 1,
            horizontal_movement: 1,
            horizontal_movement_start_chance: 1.0,
            horizontal_movement_stop_chance: 0.0,
            can_reverse_horizontal_movement: true,
        ),
    ],
)"#;

#[test]
fn test_reversal_moves_in_the_same_tick() {
    let mut grid = grid_from(REVERSING);
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 6), IVec2::new(32, 1), 1);
    grid.set_material_id(IVec2::new(17, 5), 1);
    grid.set_material_id(IVec2::new(16, 5), 2);

    // Whichever way it starts, the wall on the right sends it left this tick
    grid.step();
    assert_eq!(grid.get_material_id(IVec2::new(16, 5)), EMPTY);
    assert_eq!(grid.get_material_id(IVec2::new(15, 5)), 2);
}

#[test]
fn test_boxed_in_reversing_cell_settles() {
    let mut grid = grid_from(REVERSING);
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 6), IVec2::new(32, 1), 1);
    grid.set_material_id(IVec2::new(15, 5), 1);
    grid.set_material_id(IVec2::new(17, 5), 1);
    grid.set_material_id(IVec2::new(16, 5), 2);

    for _ in 0..10 {
        grid.step();
    }
    let cell = grid.get_cell(IVec2::new(16, 5));
    assert_eq!(cell.material_id(), 2);
    assert!(!cell.is_active());
    assert!(grid.step().is_idle());
}

// ============================================================================
// Reactions
// ============================================================================

#[test]
fn test_water_extinguishes_fire() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_material_id(IVec2::new(5, 5), WATER);
    grid.set_material_id(IVec2::new(5, 4), FIRE);

    let summary = grid.step();
    assert_eq!(summary.reactions, 1);
    assert_eq!(grid.get_material_id(IVec2::new(5, 5)), EMPTY);
    assert_eq!(grid.get_material_id(IVec2::new(5, 4)), EMPTY);
}

#[test]
fn test_reaction_with_left_neighbour_in_other_chunk() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::new(-1, 0));
    grid.try_create_chunk(IVec2::new(0, 0));
    grid.set_cell_rect(IVec2::new(-2, 11), IVec2::new(4, 1), STONE);
    grid.set_material_id(IVec2::new(-1, 10), FIRE);
    grid.set_material_id(IVec2::new(0, 10), WATER);

    grid.step();
    assert_eq!(grid.get_material_id(IVec2::new(-1, 10)), EMPTY);
    assert_eq!(grid.get_material_id(IVec2::new(0, 10)), EMPTY);
}

#[test]
fn test_removed_reaction_no_longer_fires() {
    let mut grid = test_grid();
    grid.clear_reactions();
    let handle = grid.add_reaction(WATER, FIRE, EMPTY, EMPTY, 1.0, None).unwrap();
    assert!(grid.remove_reaction(handle));
    assert!(!grid.remove_reaction(handle));

    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 6), IVec2::new(32, 1), STONE);
    grid.set_material_id(IVec2::new(5, 5), WATER);
    grid.set_material_id(IVec2::new(5, 4), FIRE);

    let summary = grid.step();
    assert_eq!(summary.reactions, 0);
    assert_eq!(count_material(&grid, IVec2::new(0, 0), IVec2::new(32, 32), WATER), 1);
}

#[test]
fn test_reaction_with_unknown_material_is_rejected() {
    let mut grid = test_grid();
    assert!(grid.add_reaction(WATER, 99, EMPTY, EMPTY, 1.0, None).is_err());
    assert_eq!(grid.reactions().len(), 1);
}

#[test]
fn test_config_with_unknown_reaction_material_fails() {
    let config = GridConfig::from_ron_str(
        r#"(
            materials: [(name: "empty"), (name: "water")],
            reactions: [(inputs: ("water", "lava"), outputs: ("empty", "empty"))],
        )"#,
    )
    .unwrap();
    assert!(Grid::from_config(&config).is_err());
}

const TAGGED: &str = r#"(
    parallel: false,
    materials: [
        (name: "empty"),
        (name: "stone", density: 100),
        (name: "water", density: 5, vertical_movement: 1, tags: ["liquid"]),
        (name: "brine", density: 6, vertical_movement: 1, tags: ["liquid", "salty"]),
        (name: "fire", density: 1, vertical_movement: -1),
        (name: "steam", density: 2, vertical_movement: -1),
    ],
    reactions: [
        (inputs: ("liquid", "fire"), outputs: ("steam", "empty")),
        (inputs: ("salty", "stone"), outputs: ("empty", "empty"), enabled: false),
    ],
)"#;

#[test]
fn test_tag_reaction_from_config_covers_every_tagged_material() {
    let mut grid = grid_from(TAGGED);
    assert_eq!(grid.reactions().len(), 1);

    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 11), IVec2::new(32, 1), 1);
    grid.set_material_id(IVec2::new(4, 10), 2);
    grid.set_material_id(IVec2::new(4, 9), 4);
    grid.set_material_id(IVec2::new(20, 10), 3);
    grid.set_material_id(IVec2::new(20, 9), 4);

    let summary = grid.step();
    assert_eq!(summary.reactions, 2);
    assert_eq!(count_material(&grid, IVec2::ZERO, IVec2::new(32, 32), 4), 0);
    assert_eq!(count_material(&grid, IVec2::ZERO, IVec2::new(32, 32), 5), 2);
    // The disabled brine + stone reaction never registered
    assert_eq!(count_material(&grid, IVec2::ZERO, IVec2::new(32, 11), 1), 0);
    assert_eq!(count_material(&grid, IVec2::new(0, 11), IVec2::new(32, 1), 1), 32);
}

#[test]
fn test_runtime_tag_reaction_removed_as_one() {
    let mut grid = grid_from(TAGGED);
    grid.clear_reactions();
    let handle = grid.add_reaction_by_tag("liquid", "fire", 5, 0, 1.0, None).unwrap();
    assert_eq!(grid.reactions().lookup(2, 4).reactions.len(), 1);
    assert_eq!(grid.reactions().lookup(4, 3).reactions.len(), 1);

    assert!(grid.remove_reaction(handle));
    assert!(grid.reactions().lookup(2, 4).is_empty());
    assert!(grid.reactions().lookup(3, 4).is_empty());

    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(0, 11), IVec2::new(32, 1), 1);
    grid.set_material_id(IVec2::new(20, 10), 3);
    grid.set_material_id(IVec2::new(20, 9), 4);
    assert_eq!(grid.step().reactions, 0);
}

#[test]
fn test_tag_reaction_with_unknown_tag_is_rejected() {
    let mut grid = grid_from(TAGGED);
    assert!(grid.add_reaction_by_tag("gas", "fire", 0, 0, 1.0, None).is_err());
    assert_eq!(grid.reactions().len(), 1);
}

// ============================================================================
// Determinism
// ============================================================================

fn scattered_grid(parallel: bool) -> Grid {
    let mut grid = test_grid();
    grid.set_parallel(parallel);

    for cy in 0..=1 {
        for cx in -3..=3 {
            grid.try_create_chunk(IVec2::new(cx, cy));
        }
    }
    grid.set_cell_rect(IVec2::new(-96, 60), IVec2::new(224, 1), STONE);

    let mut rng = Xoshiro256StarStar::seed_from_u64(99);
    for _ in 0..2000 {
        let coord = IVec2::new(rng.gen_range(-96..128), rng.gen_range(0..60));
        let material = [SAND, WATER, FIRE, GAS][rng.gen_range(0..4)];
        grid.set_material_id(coord, material);
    }
    grid
}

fn run(grid: &mut Grid, ticks: usize) -> Vec<StepSummary> {
    (0..ticks).map(|_| grid.step()).collect()
}

#[test]
fn test_reruns_are_identical() {
    let mut a = scattered_grid(true);
    let mut b = scattered_grid(true);

    assert_eq!(run(&mut a, 40), run(&mut b, 40));
    let area = (IVec2::new(-128, -32), IVec2::new(288, 128));
    assert_eq!(a.cell_buffer(area.0, area.1, false), b.cell_buffer(area.0, area.1, false));
}

#[test]
fn test_parallel_matches_serial() {
    let mut parallel = scattered_grid(true);
    let mut serial = scattered_grid(false);

    let area = (IVec2::new(-128, -32), IVec2::new(288, 128));
    for _ in 0..4 {
        assert_eq!(run(&mut parallel, 10), run(&mut serial, 10));
        assert_eq!(
            parallel.cell_buffer(area.0, area.1, false),
            serial.cell_buffer(area.0, area.1, false)
        );
    }
}

#[test]
fn test_seed_changes_outcome() {
    let mut a = scattered_grid(false);
    let mut b = scattered_grid(false);
    b.set_seed(4321);

    run(&mut a, 20);
    run(&mut b, 20);
    let area = (IVec2::new(-128, -32), IVec2::new(288, 128));
    assert_ne!(a.cell_buffer(area.0, area.1, true), b.cell_buffer(area.0, area.1, true));
}
