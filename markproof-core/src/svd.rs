//! Block partitioning and singular-value bit modulation.
//!
//! A sub-band plane is tiled into one block per payload bit. Each bit is
//! carried by the dominant singular value `σ` of its block, read as the
//! block level `v = σ / sqrt(rows * cols)`. Embedding moves `v` onto the
//! nearest point of the lattice `(m + 0.25 + 0.5 * bit) * strength`
//! (`m >= 0`) with a rank-one update along the dominant singular vectors,
//! leaving every other singular value and vector untouched.
//!
//! Reading returns the lattice phase `frac(v / strength)` in `[0, 1)`:
//! embedded zeros sit at 0.25 and ones at 0.75.

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

use crate::error::{Result, WatermarkError};

/// Smallest block edge (in band coefficients) that can carry a bit.
pub const MIN_BLOCK_EDGE: usize = 2;

const MAX_SVD_ITERATIONS: usize = 1_000;

/// Rectangular area of a plane assigned to payload bit `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRegion {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Raster-scan tiling of a plane into `block_count` equal blocks.
///
/// Cell origins sit at proportional offsets `floor(k * plane / grid)`, so a
/// block covers the same relative area of the image whatever the plane
/// size. Cells never overlap because the block edge is `floor(plane / grid)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    pub plane_rows: usize,
    pub plane_cols: usize,
    /// Grid rows and columns (cells beyond `block_count` are unused).
    pub rows: usize,
    pub cols: usize,
    pub block_rows: usize,
    pub block_cols: usize,
    pub block_count: usize,
}

impl BlockGrid {
    /// Grid dimensions for `block_count` cells: `cols = ceil(sqrt(n))`,
    /// `rows = ceil(n / cols)`. Depends on the count only.
    pub fn dimensions(block_count: usize) -> (usize, usize) {
        let mut cols = (block_count as f64).sqrt().floor() as usize;
        if cols * cols < block_count {
            cols += 1;
        }
        let cols = cols.max(1);
        (block_count.div_ceil(cols), cols)
    }

    /// Lay out `block_count` blocks over a `plane_rows x plane_cols` plane.
    pub fn new(plane_rows: usize, plane_cols: usize, block_count: usize) -> Result<Self> {
        if block_count == 0 {
            return Err(WatermarkError::InvalidInput(
                "block count must be at least 1".into(),
            ));
        }

        let (rows, cols) = Self::dimensions(block_count);
        let block_rows = plane_rows / rows;
        let block_cols = plane_cols / cols;

        if block_rows < MIN_BLOCK_EDGE || block_cols < MIN_BLOCK_EDGE {
            return Err(WatermarkError::InsufficientCapacity {
                bits: block_count,
                needed: format!(
                    "a {}x{} band",
                    rows * MIN_BLOCK_EDGE,
                    cols * MIN_BLOCK_EDGE
                ),
                available: format!("a {}x{} band", plane_rows, plane_cols),
            });
        }

        Ok(Self {
            plane_rows,
            plane_cols,
            rows,
            cols,
            block_rows,
            block_cols,
            block_count,
        })
    }

    pub fn region(&self, index: usize) -> BlockRegion {
        BlockRegion {
            index,
            row: (index / self.cols) * self.plane_rows / self.rows,
            col: (index % self.cols) * self.plane_cols / self.cols,
            rows: self.block_rows,
            cols: self.block_cols,
        }
    }

    /// Regions in payload order.
    pub fn regions(&self) -> impl Iterator<Item = BlockRegion> + '_ {
        (0..self.block_count).map(|index| self.region(index))
    }
}

/// One block's coefficients together with its location.
#[derive(Debug, Clone)]
pub struct Block {
    pub region: BlockRegion,
    pub data: DMatrix<f64>,
}

impl Block {
    /// Copy a region out of `plane`.
    pub fn read(plane: &Array2<f64>, region: BlockRegion) -> Self {
        let data = DMatrix::from_fn(region.rows, region.cols, |r, c| {
            plane[[region.row + r, region.col + c]]
        });
        Self { region, data }
    }

    /// Write this block back to its region of `plane`.
    pub fn write(&self, plane: &mut Array2<f64>) {
        for r in 0..self.region.rows {
            for c in 0..self.region.cols {
                plane[[self.region.row + r, self.region.col + c]] = self.data[(r, c)];
            }
        }
    }

    fn cell_count(&self) -> f64 {
        (self.region.rows * self.region.cols) as f64
    }
}

/// Split `plane` into `block_count` blocks in payload order.
pub fn partition(plane: &Array2<f64>, block_count: usize) -> Result<Vec<Block>> {
    let grid = BlockGrid::new(plane.nrows(), plane.ncols(), block_count)?;
    Ok(grid.regions().map(|region| Block::read(plane, region)).collect())
}

/// Hard decision on a lattice phase returned by [`BlockSvdCodec::read_bit`].
pub fn decide(phase: f64) -> u8 {
    if phase >= 0.5 {
        1
    } else {
        0
    }
}

/// Quantization-index modulation of a block's dominant singular value.
#[derive(Debug, Clone, Copy)]
pub struct BlockSvdCodec {
    strength: f64,
    value_range: Option<(f64, f64)>,
}

impl BlockSvdCodec {
    /// `strength` is the lattice step in block-level units (grey levels for
    /// normalised approximation bands).
    pub fn new(strength: f64) -> Result<Self> {
        if !strength.is_finite() || strength <= 0.0 {
            return Err(WatermarkError::InvalidInput(format!(
                "embedding strength must be a positive number, got {}",
                strength
            )));
        }
        Ok(Self {
            strength,
            value_range: None,
        })
    }

    /// Prefer the lattice point that keeps every coefficient inside
    /// `[low, high]` when the nearest one would not.
    pub fn with_value_range(mut self, low: f64, high: f64) -> Self {
        self.value_range = Some((low, high));
        self
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Block level `σ / sqrt(n)` of the dominant singular value.
    pub fn level(&self, block: &Block) -> Result<f64> {
        let component = dominant_component(&block.data)?;
        Ok(component.value / block.cell_count().sqrt())
    }

    /// Embed `bit` into `block`, returning the modified block.
    pub fn embed_bit(&self, block: &Block, bit: u8) -> Result<Block> {
        if bit > 1 {
            return Err(WatermarkError::InvalidInput(format!(
                "bit values must be 0 or 1, got {}",
                bit
            )));
        }

        let scale = block.cell_count().sqrt();
        let component = dominant_component(&block.data)?;
        let level = component.value / scale;

        let (below, above) = self.lattice_neighbours(level, bit);
        let target = self.choose_target(block, &component, scale, level, below, above);

        let delta = (target - level) * scale;
        let data = &block.data + (&component.left * component.right.transpose()) * delta;
        if data.iter().any(|v| !v.is_finite()) {
            return Err(WatermarkError::Processing(format!(
                "block {} produced non-finite coefficients",
                block.region.index
            )));
        }

        Ok(Block {
            region: block.region,
            data,
        })
    }

    /// Lattice phase of the block level, in `[0, 1)`. Not thresholded.
    pub fn read_bit(&self, block: &Block) -> Result<f64> {
        let level = self.level(block)?;
        Ok((level / self.strength).fract())
    }

    /// Closest non-negative lattice points for `bit` at or below and above `level`.
    fn lattice_neighbours(&self, level: f64, bit: u8) -> (Option<f64>, f64) {
        let offset = (0.25 + 0.5 * f64::from(bit)) * self.strength;
        let m = ((level - offset) / self.strength).floor();
        let below = (m >= 0.0).then(|| m * self.strength + offset);
        let above = (m + 1.0).max(0.0) * self.strength + offset;
        (below, above)
    }

    fn choose_target(
        &self,
        block: &Block,
        component: &DominantComponent,
        scale: f64,
        level: f64,
        below: Option<f64>,
        above: f64,
    ) -> f64 {
        let Some(below) = below else {
            return above;
        };

        let (nearest, other) = if level - below <= above - level {
            (below, above)
        } else {
            (above, below)
        };

        match self.value_range {
            Some(range)
                if !fits(block, component, (nearest - level) * scale, range)
                    && fits(block, component, (other - level) * scale, range) =>
            {
                other
            }
            _ => nearest,
        }
    }
}

struct DominantComponent {
    value: f64,
    left: DVector<f64>,
    right: DVector<f64>,
}

fn dominant_component(matrix: &DMatrix<f64>) -> Result<DominantComponent> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(WatermarkError::Processing(
            "block contains non-finite coefficients".into(),
        ));
    }

    // A null block has no preferred direction; lift it uniformly.
    if matrix.iter().all(|&v| v == 0.0) {
        let (rows, cols) = matrix.shape();
        return Ok(DominantComponent {
            value: 0.0,
            left: DVector::from_element(rows, 1.0 / (rows as f64).sqrt()),
            right: DVector::from_element(cols, 1.0 / (cols as f64).sqrt()),
        });
    }

    let svd = matrix
        .clone()
        .try_svd(true, true, f64::EPSILON, MAX_SVD_ITERATIONS)
        .ok_or_else(|| WatermarkError::Processing("block SVD did not converge".into()))?;

    let (index, value) = svd
        .singular_values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, s)| {
            if s > best.1 {
                (i, s)
            } else {
                best
            }
        });

    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(WatermarkError::Processing(
                "block SVD returned no singular vectors".into(),
            ))
        }
    };

    Ok(DominantComponent {
        value,
        left: u.column(index).into_owned(),
        right: v_t.row(index).transpose(),
    })
}

fn fits(block: &Block, component: &DominantComponent, delta: f64, (low, high): (f64, f64)) -> bool {
    const SLACK: f64 = 1e-9;
    (0..block.data.nrows()).all(|r| {
        (0..block.data.ncols()).all(|c| {
            let v = block.data[(r, c)] + delta * component.left[r] * component.right[c];
            v >= low - SLACK && v <= high + SLACK
        })
    })
}
