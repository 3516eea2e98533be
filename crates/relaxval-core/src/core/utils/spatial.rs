use nalgebra::Point3;
use std::collections::HashMap;

type CellKey = (i64, i64, i64);

/// Uniform cell grid over a fixed set of points.
///
/// Each point lands in one cubic cell; a neighbour query visits the 27 cells
/// around the query position, so every point within `cell_size` is found.
#[derive(Debug)]
pub struct CellGrid {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl CellGrid {
    pub fn new(positions: &[Point3<f64>], cell_size: f64) -> Self {
        let mut grid = Self {
            cell_size: cell_size.max(1.0e-6),
            cells: HashMap::new(),
        };
        for (idx, pos) in positions.iter().enumerate() {
            let key = grid.cell_index(pos);
            grid.cells.entry(key).or_default().push(idx);
        }
        grid
    }

    fn cell_index(&self, p: &Point3<f64>) -> CellKey {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn for_each_neighbor<F>(&self, pos: &Point3<f64>, mut f: F)
    where
        F: FnMut(usize),
    {
        let (ix, iy, iz) = self.cell_index(pos);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(members) = self.cells.get(&(ix + dx, iy + dy, iz + dz)) {
                        members.iter().copied().for_each(&mut f);
                    }
                }
            }
        }
    }
}

/// All index pairs `(i, j)` with `i < j` closer than `cutoff`, in ascending order.
pub fn pairs_within(positions: &[Point3<f64>], cutoff: f64) -> Vec<(usize, usize, f64)> {
    let grid = CellGrid::new(positions, cutoff);
    let mut pairs = Vec::new();
    for (i, pos) in positions.iter().enumerate() {
        grid.for_each_neighbor(pos, |j| {
            if j > i {
                let d = (positions[j] - pos).norm();
                if d < cutoff {
                    pairs.push((i, j, d));
                }
            }
        });
    }
    pairs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    pairs
}
