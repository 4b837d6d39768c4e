//! Noise terrain for the demo world

use fastnoise_lite::{FastNoiseLite, NoiseType};
use sandgrid_core::world::{CellCursor, ChunkCursor, GenerationPass};

/// Material ids used by [`TerrainPass`]
#[derive(Clone, Copy, Debug)]
pub struct TerrainMaterials {
    pub stone: u16,
    pub sand: u16,
    pub water: u16,
}

/// Rolling stone hills with a sand crust; valleys below `sea_level` fill with water
pub struct TerrainPass {
    materials: TerrainMaterials,
    height_noise: FastNoiseLite,
    cave_noise: FastNoiseLite,
    surface: i32,
    amplitude: f32,
    sea_level: i32,
    sand_depth: i32,
}

impl TerrainPass {
    pub fn new(seed: u64, materials: TerrainMaterials, surface: i32) -> Self {
        let mut height_noise = FastNoiseLite::with_seed(seed as i32);
        height_noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        height_noise.set_frequency(Some(0.01));

        let mut cave_noise = FastNoiseLite::with_seed((seed as i32).wrapping_add(1));
        cave_noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        cave_noise.set_frequency(Some(0.04));

        Self {
            materials,
            height_noise,
            cave_noise,
            surface,
            amplitude: 24.0,
            sea_level: surface + 6,
            sand_depth: 4,
        }
    }

    fn surface_at(&self, x: i32) -> i32 {
        self.surface + (self.height_noise.get_noise_2d(x as f32, 0.0) * self.amplitude) as i32
    }
}

impl GenerationPass for TerrainPass {
    fn name(&self) -> &str {
        "terrain"
    }

    fn generate(&self, cursor: &mut ChunkCursor<'_>) {
        while cursor.advance() {
            let coord = cursor.coord();
            let surface = self.surface_at(coord.x);

            let material = if coord.y < surface {
                (coord.y >= self.sea_level).then_some(self.materials.water)
            } else if coord.y < surface + self.sand_depth {
                Some(self.materials.sand)
            } else if self.cave_noise.get_noise_2d(coord.x as f32, coord.y as f32) > 0.55 {
                None
            } else {
                Some(self.materials.stone)
            };

            if let Some(material) = material {
                cursor.set_material_id(material);
            }
        }
    }
}
