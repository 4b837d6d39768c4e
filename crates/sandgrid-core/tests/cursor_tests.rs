//! Integration tests for cursors, generation passes and coordinate mapping

use std::collections::HashSet;

use glam::IVec2;
use sandgrid_core::simulation::{CHUNK_AREA, MaterialDescriptor};
use sandgrid_core::world::{
    CellCursor, ChunkCursor, ChunkManager, FLOOD_FILL_EXTENT, GenerationPass,
};
use sandgrid_core::Grid;

const STONE: u16 = 1;
const SAND: u16 = 2;
const PAINT: u16 = 3;

fn test_grid() -> Grid {
    let mut grid = Grid::new();
    grid.set_parallel(false);
    grid.configure_materials(&[
        MaterialDescriptor::empty(),
        MaterialDescriptor {
            name: "stone".into(),
            density: 100,
            ..Default::default()
        },
        MaterialDescriptor {
            name: "sand".into(),
            density: 10,
            vertical_movement: 1,
            noise_darken_max: 3,
            ..Default::default()
        },
        MaterialDescriptor {
            name: "paint".into(),
            density: 100,
            can_color: true,
            ..Default::default()
        },
    ])
    .unwrap();
    grid
}

// ============================================================================
// Coordinates
// ============================================================================

#[test]
fn test_world_chunk_round_trip() {
    for y in -70..70 {
        for x in -70..70 {
            let world = IVec2::new(x, y);
            let (chunk, lx, ly) = ChunkManager::world_to_chunk_coords(world);
            assert!(lx < 32 && ly < 32);
            assert_eq!(ChunkManager::chunk_to_world_coords(chunk, lx, ly), world);
        }
    }
}

#[test]
fn test_missing_chunks_read_as_empty() {
    let grid = test_grid();
    assert_eq!(grid.get_material_id(IVec2::new(-1000, 5000)), 0);
    assert!(grid.get_cell(IVec2::new(3, 3)).is_empty());
    assert_eq!(grid.cell_buffer(IVec2::new(-2, -2), IVec2::new(4, 4), true), vec![0; 16]);
}

// ============================================================================
// Rect and line cursors
// ============================================================================

#[test]
fn test_rect_cursor_fill_across_chunks() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::new(-1, 0));
    grid.try_create_chunk(IVec2::new(0, 0));

    let written = grid
        .iter_rect(IVec2::new(-4, 2), IVec2::new(8, 2))
        .fill_remaining(STONE);
    assert_eq!(written, 16);
    assert_eq!(grid.get_material_id(IVec2::new(-4, 2)), STONE);
    assert_eq!(grid.get_material_id(IVec2::new(3, 3)), STONE);
    assert_eq!(grid.get_material_id(IVec2::new(4, 3)), 0);
}

#[test]
fn test_rect_cursor_skips_missing_chunks() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);

    let written = grid
        .iter_rect(IVec2::new(-2, 0), IVec2::new(4, 1))
        .fill_remaining(STONE);
    assert_eq!(written, 2);
}

#[test]
fn test_rect_cursor_reads_and_writes() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_material_id(IVec2::new(1, 1), STONE);

    let mut cursor = grid.iter_rect(IVec2::ZERO, IVec2::new(3, 3));
    let mut visited = Vec::new();
    while cursor.advance() {
        visited.push(cursor.coord());
        assert_eq!(cursor.chunk_coord(), IVec2::ZERO);
        if cursor.material_id() == STONE {
            assert_eq!(cursor.local_coord(), (1, 1));
            assert!(cursor.set_material_id(SAND));
        }
    }
    assert_eq!(visited.len(), 9);
    assert_eq!(visited[0], IVec2::ZERO);
    assert_eq!(visited[8], IVec2::new(2, 2));
    assert_eq!(grid.get_material_id(IVec2::new(1, 1)), SAND);
}

#[test]
fn test_line_cursor() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);

    let mut cursor = grid.iter_line(IVec2::new(2, 2), IVec2::new(12, 7));
    let mut coords = Vec::new();
    while cursor.advance() {
        coords.push(cursor.coord());
        cursor.set_material_id(STONE);
    }
    assert_eq!(coords.len(), 11);
    assert_eq!(coords.first(), Some(&IVec2::new(2, 2)));
    assert_eq!(coords.last(), Some(&IVec2::new(12, 7)));
    for pair in coords.windows(2) {
        let step = pair[1] - pair[0];
        assert!(step.x.abs() <= 1 && step.y.abs() <= 1);
    }
    assert_eq!(
        grid.chunk_manager().get(IVec2::ZERO).unwrap().count_non_empty(),
        11
    );
}

#[test]
fn test_set_color_requires_colorable_material() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_material_id(IVec2::new(0, 0), PAINT);
    grid.set_material_id(IVec2::new(1, 0), STONE);

    let mut cursor = grid.iter_rect(IVec2::ZERO, IVec2::new(2, 1));
    assert!(cursor.advance());
    assert!(cursor.set_color(200));
    assert_eq!(cursor.color(), 200);
    assert!(cursor.advance());
    assert!(!cursor.set_color(200));
    assert!(!cursor.advance());

    assert_eq!(grid.get_color(IVec2::new(0, 0)), 200);
    assert_eq!(grid.get_color(IVec2::new(1, 0)), 0);
}

// ============================================================================
// Flood fill
// ============================================================================

#[test]
fn test_flood_fill_crosses_chunks() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::new(0, 0));
    grid.try_create_chunk(IVec2::new(1, 0));
    grid.set_cell_rect(IVec2::new(28, 4), IVec2::new(8, 3), STONE);
    // Touches only diagonally, not part of the region
    grid.set_material_id(IVec2::new(36, 7), STONE);

    let mut seen = HashSet::new();
    let mut cursor = grid.iter_flood_fill(IVec2::new(29, 5), STONE);
    while cursor.advance() {
        assert_eq!(cursor.material_id(), STONE);
        assert!(seen.insert(cursor.coord()), "{} visited twice", cursor.coord());
    }
    assert_eq!(seen.len(), 24);
    assert!(!seen.contains(&IVec2::new(36, 7)));
}

#[test]
fn test_flood_fill_replace() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_cell_rect(IVec2::new(2, 2), IVec2::new(5, 5), STONE);

    let written = grid.iter_flood_fill(IVec2::new(4, 4), STONE).fill_remaining(SAND);
    assert_eq!(written, 25);
    assert_eq!(grid.get_material_id(IVec2::new(2, 2)), SAND);
    assert_eq!(grid.get_material_id(IVec2::new(6, 6)), SAND);
}

#[test]
fn test_flood_fill_wrong_seed_material() {
    let mut grid = test_grid();
    grid.try_create_chunk(IVec2::ZERO);
    grid.set_material_id(IVec2::new(4, 4), STONE);

    assert!(!grid.iter_flood_fill(IVec2::new(4, 4), SAND).advance());
    assert!(!grid.iter_flood_fill(IVec2::new(400, 4), 0).advance());
}

#[test]
fn test_flood_fill_limited_to_window() {
    let mut grid = test_grid();
    for cx in -1..=20 {
        grid.try_create_chunk(IVec2::new(cx, 0));
    }
    grid.set_cell_rect(IVec2::new(-32, 0), IVec2::new(32 * 22, 1), STONE);

    let mut count = 0;
    let mut max_x = i32::MIN;
    let mut cursor = grid.iter_flood_fill(IVec2::new(300, 0), STONE);
    while cursor.advance() {
        count += 1;
        max_x = max_x.max(cursor.coord().x);
    }
    let half = FLOOD_FILL_EXTENT / 2;
    assert_eq!(count, FLOOD_FILL_EXTENT as usize);
    assert_eq!(max_x, 300 + half - 1);
}

// ============================================================================
// Chunk cursor and generation passes
// ============================================================================

#[test]
fn test_chunk_cursor() {
    let mut grid = test_grid();
    assert!(grid.iter_chunk(IVec2::ZERO).is_none());
    grid.try_create_chunk(IVec2::new(2, -1));

    {
        let mut cursor = grid.iter_chunk(IVec2::new(2, -1)).unwrap();
        let mut visited = 0;
        while cursor.advance() {
            visited += 1;
            if cursor.local_coord().1 >= 16 {
                cursor.set_material_id(STONE);
            }
        }
        assert_eq!(visited, CHUNK_AREA);
    }

    assert_eq!(grid.get_material_id(IVec2::new(64, -16)), STONE);
    assert_eq!(grid.get_material_id(IVec2::new(64, -17)), 0);
    let chunk = grid.chunk_manager().get(IVec2::new(2, -1)).unwrap();
    assert_eq!(chunk.count_non_empty(), CHUNK_AREA / 2);
    assert!(chunk.is_active());
}

/// Fills the lower half of every chunk and sprinkles sand on the upper half
struct HalfFill;

impl GenerationPass for HalfFill {
    fn name(&self) -> &str {
        "half_fill"
    }

    fn generate(&self, cursor: &mut ChunkCursor<'_>) {
        while cursor.advance() {
            let (_, y) = cursor.local_coord();
            if y >= 16 {
                cursor.set_material_id(STONE);
            } else if cursor.check_probability(0.25) {
                cursor.set_material_id(SAND);
            }
        }
    }
}

/// Runs after [`HalfFill`] and sees its output
struct TopRowPaint;

impl GenerationPass for TopRowPaint {
    fn generate(&self, cursor: &mut ChunkCursor<'_>) {
        while cursor.advance() {
            if cursor.local_coord().1 == 16 && cursor.material_id() == STONE {
                cursor.set_material_id(PAINT);
            }
        }
    }
}

#[test]
fn test_generation_passes_run_in_order() {
    let mut grid = test_grid();
    grid.add_generation_pass(HalfFill);
    grid.add_generation_pass(TopRowPaint);
    grid.try_create_chunk(IVec2::new(-1, 3));

    let base = IVec2::new(-32, 96);
    assert_eq!(grid.get_material_id(base + IVec2::new(0, 16)), PAINT);
    assert_eq!(grid.get_material_id(base + IVec2::new(31, 16)), PAINT);
    assert_eq!(grid.get_material_id(base + IVec2::new(5, 17)), STONE);
    assert_eq!(grid.get_material_id(base + IVec2::new(5, 31)), STONE);
}

#[test]
fn test_generation_is_deterministic_per_seed() {
    let generate = |seed: u64| {
        let mut grid = test_grid();
        grid.set_seed(seed);
        grid.add_generation_pass(HalfFill);
        grid.try_create_chunk(IVec2::new(4, -2));
        grid.cell_buffer(IVec2::new(128, -64), IVec2::new(32, 16), true)
    };

    assert_eq!(generate(1), generate(1));
    assert_ne!(generate(1), generate(2));
}

#[test]
fn test_generation_runs_for_border_chunks() {
    let mut grid = test_grid();
    grid.add_generation_pass(HalfFill);
    grid.try_create_chunk(IVec2::ZERO);
    grid.step();

    assert!(grid.chunk_manager().get(IVec2::new(1, 0)).unwrap().is_border());
    assert_eq!(grid.get_material_id(IVec2::new(40, 20)), STONE);
}
