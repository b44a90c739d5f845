//! Capacity-factor evaluation for one tile.

use std::ops::Range;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

use cutout::CutoutProvider;

use crate::error::EvaluationError;
use crate::partition::Tile;
use crate::technology::{Technology, TechnologySpec};

/// Capacity factors of one tile, laid out `[technology][time][row][lon]`.
///
/// Ineligible cells and missing weather are NaN; every other value lies in
/// `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CfCube {
    pub tile: usize,
    pub rows: Range<usize>,
    pub technologies: Vec<String>,
    pub n_time: usize,
    pub n_lon: usize,
    pub data: Vec<f32>,
    /// `[row][lon]`: 1 land, 0 sea, NaN unknown.
    pub land_mask: Vec<f32>,
}

impl CfCube {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// `[technology, time, row, lon]`
    pub fn shape(&self) -> [usize; 4] {
        [self.technologies.len(), self.n_time, self.n_rows(), self.n_lon]
    }

    #[inline]
    pub fn index(&self, tech: usize, t: usize, row: usize, col: usize) -> usize {
        ((tech * self.n_time + t) * self.n_rows() + row) * self.n_lon + col
    }

    /// Value at a tile-relative row.
    pub fn value(&self, tech: usize, t: usize, row: usize, col: usize) -> f32 {
        self.data[self.index(tech, t, row, col)]
    }
}

/// Evaluates tiles with a fixed set of technologies on a dedicated pool.
pub struct CfEvaluator {
    specs: Vec<TechnologySpec>,
    pool: ThreadPool,
}

impl CfEvaluator {
    /// `threads` sizes the pool; rayon's default (one per core) when `None`.
    pub fn new(specs: Vec<TechnologySpec>, threads: Option<usize>) -> Result<Self, EvaluationError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("cf-eval-{}", i));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| EvaluationError::ThreadPool(e.to_string()))?;
        Ok(Self { specs, pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Compute the tile's cube for every technology over the full time axis.
    ///
    /// The tile's rows must already be prepared in the cutout.
    pub fn evaluate<C: CutoutProvider + ?Sized>(
        &self,
        cutout: &C,
        tile: &Tile,
    ) -> Result<CfCube, EvaluationError> {
        let technologies = self
            .specs
            .iter()
            .map(Technology::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        let n_time = cutout.time_axis().len;
        let fields = cutout
            .load_region(tile.rows.clone(), 0..n_time)
            .map_err(|source| EvaluationError::Load {
                rows: tile.rows.clone(),
                source,
            })?;
        let n_rows = fields.n_rows();
        let n_lon = fields.n_lon();
        let n_tech = technologies.len();

        debug!(
            tile = tile.index,
            rows = ?tile.rows,
            technologies = n_tech,
            threads = self.threads(),
            "Evaluating tile"
        );

        // One block per row, `[technology][time][lon]`.
        let blocks: Vec<Vec<f32>> = self.pool.install(|| {
            (0..n_rows)
                .into_par_iter()
                .map(|row| {
                    let mut block = vec![f32::NAN; n_tech * n_time * n_lon];
                    let mut series = vec![0.0f32; n_time];
                    for (k, technology) in technologies.iter().enumerate() {
                        for col in 0..n_lon {
                            if !technology.eligibility.allows(fields.is_land(row, col)) {
                                continue;
                            }
                            technology.cell_series(&fields, row, col, &mut series);
                            for (t, value) in series.iter().enumerate() {
                                block[(k * n_time + t) * n_lon + col] = clip(*value);
                            }
                        }
                    }
                    block
                })
                .collect()
        });

        let mut data = vec![f32::NAN; n_tech * n_time * n_rows * n_lon];
        for (row, block) in blocks.iter().enumerate() {
            for k in 0..n_tech {
                for t in 0..n_time {
                    let src = (k * n_time + t) * n_lon;
                    let dst = ((k * n_time + t) * n_rows + row) * n_lon;
                    data[dst..dst + n_lon].copy_from_slice(&block[src..src + n_lon]);
                }
            }
        }

        info!(
            tile = tile.index,
            rows = ?tile.rows,
            values = data.len(),
            "Evaluated capacity factors"
        );

        Ok(CfCube {
            tile: tile.index,
            rows: tile.rows.clone(),
            technologies: technologies.into_iter().map(|t| t.name).collect(),
            n_time,
            n_lon,
            data,
            land_mask: fields.land_mask,
        })
    }
}

fn clip(value: f32) -> f32 {
    if value.is_nan() {
        value
    } else {
        value.clamp(0.0, 1.0)
    }
}
