#![allow(dead_code)]

use framesched::{freeze_components, register_component, Chunk1, Chunk2, ReadChunk};

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;

pub const CHUNK_ROWS: usize = 4_096;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy)]
pub struct Wealth {
    pub value: f64,
}

/// Chunked column storage standing in for the external storage engine.
pub struct BenchWorld {
    pub entities: Vec<u64>,
    pub positions: Vec<Position>,
    pub velocities: Vec<Velocity>,
    pub wealth: Vec<Wealth>,
}

impl BenchWorld {
    pub fn new(agent_count: usize) -> Self {
        Self {
            entities: (0..agent_count as u64).collect(),
            positions: vec![Position { x: 0.0, y: 0.0 }; agent_count],
            velocities: (0..agent_count)
                .map(|i| Velocity {
                    dx: (i % 5) as f32 * 0.25,
                    dy: (i % 9) as f32 * 0.125,
                })
                .collect(),
            wealth: vec![Wealth { value: 100.0 }; agent_count],
        }
    }

    pub fn motion_chunks(&mut self) -> Vec<Chunk2<'_, Velocity, Position>> {
        self.entities
            .chunks(CHUNK_ROWS)
            .zip(self.velocities.chunks(CHUNK_ROWS))
            .zip(self.positions.chunks_mut(CHUNK_ROWS))
            .map(|((entities, a), b)| Chunk2 { entities, a, b })
            .collect()
    }

    pub fn wealth_chunks(&mut self) -> Vec<Chunk1<'_, Wealth>> {
        self.entities
            .chunks(CHUNK_ROWS)
            .zip(self.wealth.chunks_mut(CHUNK_ROWS))
            .map(|(entities, a)| Chunk1 { entities, a })
            .collect()
    }

    pub fn wealth_read_chunks(&self) -> Vec<ReadChunk<'_, Wealth>> {
        self.entities
            .chunks(CHUNK_ROWS)
            .zip(self.wealth.chunks(CHUNK_ROWS))
            .map(|(entities, a)| ReadChunk { entities, a })
            .collect()
    }
}

pub fn init_components() {
    let _ = register_component::<Position>();
    let _ = register_component::<Velocity>();
    let _ = register_component::<Wealth>();
    freeze_components();
}
