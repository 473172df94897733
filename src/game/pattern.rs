//! Wall hole patterns
//!
//! Eight pattern kinds in three difficulty tiers. Every generator is a pure
//! function of its inputs and the injected random source, and every grid it
//! returns contains at least one 2x2 opening a standing player fits through.

use bitvec::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::game::constants::wall::MIN_PASSABLE_HOLE;

/// Pattern difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Basic,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Basic, Difficulty::Advanced, Difficulty::Expert];

    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Basic => "basic",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

/// Hole layout rule for a wall face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    SimpleCross,
    SingleHole,
    DoubleHole,
    Zigzag,
    Spiral,
    RandomHoles,
    ComplexMaze,
    ShiftingHoles,
}

impl PatternKind {
    pub const ALL: [PatternKind; 8] = [
        PatternKind::SimpleCross,
        PatternKind::SingleHole,
        PatternKind::DoubleHole,
        PatternKind::Zigzag,
        PatternKind::Spiral,
        PatternKind::RandomHoles,
        PatternKind::ComplexMaze,
        PatternKind::ShiftingHoles,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::SimpleCross => "simple_cross",
            PatternKind::SingleHole => "single_hole",
            PatternKind::DoubleHole => "double_hole",
            PatternKind::Zigzag => "zigzag",
            PatternKind::Spiral => "spiral",
            PatternKind::RandomHoles => "random_holes",
            PatternKind::ComplexMaze => "complex_maze",
            PatternKind::ShiftingHoles => "shifting_holes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn difficulty(&self) -> Difficulty {
        match self {
            PatternKind::SimpleCross | PatternKind::SingleHole | PatternKind::DoubleHole => {
                Difficulty::Basic
            }
            PatternKind::Zigzag | PatternKind::Spiral | PatternKind::RandomHoles => {
                Difficulty::Advanced
            }
            PatternKind::ComplexMaze | PatternKind::ShiftingHoles => Difficulty::Expert,
        }
    }

    /// Whether walls using this pattern regenerate their holes while moving
    pub fn is_shifting(&self) -> bool {
        matches!(self, PatternKind::ShiftingHoles)
    }
}

/// One cell of a wall face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Solid,
    Hole,
}

/// Width x height grid of solid and hole cells
///
/// `x` runs along the wall face, `y` is the row above the wall base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoleGrid {
    width: usize,
    height: usize,
    holes: BitVec,
}

impl HoleGrid {
    /// A fully solid grid
    pub fn solid(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            holes: bitvec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn is_hole(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.holes[self.index(x, y)]
    }

    pub fn cell(&self, x: usize, y: usize) -> Cell {
        if self.is_hole(x, y) {
            Cell::Hole
        } else {
            Cell::Solid
        }
    }

    /// Mark a cell as a hole; out-of-range coordinates are ignored
    pub fn set_hole(&mut self, x: usize, y: usize) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.holes.set(i, true);
        }
    }

    /// Open a `w` x `h` rectangle with its minimum corner at (x, y), clipped to the grid
    pub fn carve(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for cx in x..(x + w).min(self.width) {
            for cy in y..(y + h).min(self.height) {
                self.set_hole(cx, cy);
            }
        }
    }

    pub fn hole_count(&self) -> usize {
        self.holes.count_ones()
    }

    pub fn solid_count(&self) -> usize {
        self.holes.count_zeros()
    }

    /// Minimum corner of the first all-hole `size` x `size` block
    pub fn find_open_block(&self, size: usize) -> Option<(usize, usize)> {
        if size == 0 || size > self.width || size > self.height {
            return None;
        }
        for y in 0..=self.height - size {
            for x in 0..=self.width - size {
                let open = (0..size).all(|dy| (0..size).all(|dx| self.is_hole(x + dx, y + dy)));
                if open {
                    return Some((x, y));
                }
            }
        }
        None
    }

    /// Whether a standing player fits through somewhere
    pub fn is_passable(&self) -> bool {
        self.find_open_block(MIN_PASSABLE_HOLE).is_some()
    }

    /// Iterate every cell as (x, y, cell)
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| (x, y, self.cell(x, y))))
    }
}

/// Random source for the shifting pattern at a given reseed epoch
pub fn shifting_rng(base_seed: u64, epoch: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(epoch))
}

/// Generate the hole grid for a pattern
///
/// Deterministic kinds ignore `rng`. For [`PatternKind::ShiftingHoles`] the
/// caller reseeds `rng` once per epoch (see [`shifting_rng`]).
pub fn generate<R: Rng + ?Sized>(kind: PatternKind, width: usize, height: usize, rng: &mut R) -> HoleGrid {
    let mut grid = HoleGrid::solid(width, height);
    if width == 0 || height == 0 {
        return grid;
    }

    match kind {
        PatternKind::SimpleCross => simple_cross(&mut grid),
        PatternKind::SingleHole => single_hole(&mut grid, rng),
        PatternKind::DoubleHole => double_hole(&mut grid),
        PatternKind::Zigzag => zigzag(&mut grid),
        PatternKind::Spiral => spiral(&mut grid),
        PatternKind::RandomHoles => random_holes(&mut grid, rng),
        PatternKind::ComplexMaze => complex_maze(&mut grid, rng),
        PatternKind::ShiftingHoles => shifting_holes(&mut grid, rng),
    }

    ensure_passable(&mut grid);
    grid
}

/// Carve a centred opening if the rule left none
fn ensure_passable(grid: &mut HoleGrid) {
    if grid.is_passable() {
        return;
    }
    let x = (grid.width / 2).saturating_sub(1);
    let y = (grid.height / 2).saturating_sub(1);
    grid.carve(x, y, MIN_PASSABLE_HOLE, MIN_PASSABLE_HOLE);
}

/// 3-wide horizontal bar and 3-tall vertical bar through the centre, both two cells thick
fn simple_cross(grid: &mut HoleGrid) {
    let cx = grid.width / 2;
    let cy = grid.height / 2;

    grid.carve(cx.saturating_sub(1), cy.saturating_sub(1), 3, 2);
    grid.carve(cx.saturating_sub(1), cy.saturating_sub(1), 2, 3);
}

/// One 2x2 hole at a random spot, one cell clear of every edge
fn single_hole<R: Rng + ?Sized>(grid: &mut HoleGrid, rng: &mut R) {
    let x = if grid.width > 3 { rng.gen_range(1..=grid.width - 3) } else { 0 };
    let y = if grid.height > 3 { rng.gen_range(1..=grid.height - 3) } else { 0 };
    grid.carve(x, y, 2, 2);
}

/// Two 3x3 holes at a quarter and three quarters of the width
fn double_hole(grid: &mut HoleGrid) {
    let cy = grid.height / 2;
    for cx in [grid.width / 4, (3 * grid.width) / 4] {
        grid.carve(cx.saturating_sub(1), cy.saturating_sub(1), 3, 3);
    }
}

fn zigzag(grid: &mut HoleGrid) {
    for x in 0..grid.width {
        let offset = if x % 4 < 2 { 0 } else { 2 };
        for y in 0..grid.height {
            if (y + offset) % 4 < 2 {
                grid.set_hole(x, y);
            }
        }
    }
}

fn spiral(grid: &mut HoleGrid) {
    let cx = (grid.width / 2) as f64;
    let cy = (grid.height / 2) as f64;
    for x in 0..grid.width {
        for y in 0..grid.height {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            let angle = dy.atan2(dx);

            // Truncating remainder: negative phases count as holes
            if (distance + angle * 2.0) % 3.0 < 1.5 {
                grid.set_hole(x, y);
            }
        }
    }
}

/// Each cell a hole with probability 0.3, plus one guaranteed 2x2 hole
fn random_holes<R: Rng + ?Sized>(grid: &mut HoleGrid, rng: &mut R) {
    for x in 0..grid.width {
        for y in 0..grid.height {
            if rng.gen_bool(0.3) {
                grid.set_hole(x, y);
            }
        }
    }

    let x = rng.gen_range(0..grid.width.saturating_sub(1).max(1));
    let y = rng.gen_range(0..grid.height.saturating_sub(1).max(1));
    grid.carve(x, y, 2, 2);
}

/// L-shaped stamps on a 2-cell lattice, plus 2-3 guaranteed 3x3 passages
fn complex_maze<R: Rng + ?Sized>(grid: &mut HoleGrid, rng: &mut R) {
    for x in (0..grid.width).step_by(2) {
        for y in (0..grid.height).step_by(2) {
            if rng.gen_bool(0.7) {
                grid.set_hole(x, y);
                grid.set_hole(x + 1, y);
                grid.set_hole(x, y + 1);
            }
        }
    }

    let passages = rng.gen_range(2..=3);
    for _ in 0..passages {
        let x = rng.gen_range(0..grid.width.saturating_sub(3).max(1));
        let y = rng.gen_range(0..grid.height.saturating_sub(3).max(1));
        grid.carve(x, y, 3, 3);
    }
}

/// Gaussian noise per cell; a hole where the sample lies in (-0.5, 0.5)
fn shifting_holes<R: Rng + ?Sized>(grid: &mut HoleGrid, rng: &mut R) {
    for x in 0..grid.width {
        for y in 0..grid.height {
            let noise: f64 = rng.sample(StandardNormal);
            if noise > -0.5 && noise < 0.5 {
                grid.set_hole(x, y);
            }
        }
    }
}
