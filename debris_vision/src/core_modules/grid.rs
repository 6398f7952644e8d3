// THEORY:
// The `Grid` module is the shared spatial container of the analysis layer. Depth
// maps and debris masks are both small, fixed-resolution, row-major grids, and
// the volume math only ever needs a few summary operations over them: the mean
// of every cell, the mean of the cells selected by another grid, and rectangular
// windows. Like `Pixel`, a `Grid` is a "dumb" data container; it knows how to
// summarize itself but not what its values mean.

pub mod grid {
    /// A row-major 2D grid of cells.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Grid<T> {
        width: usize,
        height: usize,
        cells: Vec<T>,
    }

    impl<T: Copy> Grid<T> {
        /// A grid with every cell set to `fill`.
        pub fn filled(width: usize, height: usize, fill: T) -> Self {
            Self {
                width,
                height,
                cells: vec![fill; width * height],
            }
        }

        /// A grid whose cell at (x, y) is `f(x, y)`.
        pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
            let mut cells = Vec::with_capacity(width * height);
            for y in 0..height {
                for x in 0..width {
                    cells.push(f(x, y));
                }
            }
            Self {
                width,
                height,
                cells,
            }
        }

        pub fn width(&self) -> usize {
            self.width
        }

        pub fn height(&self) -> usize {
            self.height
        }

        pub fn len(&self) -> usize {
            self.cells.len()
        }

        pub fn is_empty(&self) -> bool {
            self.cells.is_empty()
        }

        pub fn get(&self, x: usize, y: usize) -> T {
            self.cells[y * self.width + x]
        }

        pub fn set(&mut self, x: usize, y: usize, value: T) {
            self.cells[y * self.width + x] = value;
        }

        pub fn cells(&self) -> &[T] {
            &self.cells
        }

        pub fn row(&self, y: usize) -> &[T] {
            &self.cells[y * self.width..(y + 1) * self.width]
        }

        pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
            self.width == other.width && self.height == other.height
        }
    }

    impl Grid<bool> {
        /// Fraction of true cells, 0.0 for an empty grid.
        pub fn coverage(&self) -> f64 {
            if self.cells.is_empty() {
                return 0.0;
            }
            self.count() as f64 / self.cells.len() as f64
        }

        pub fn count(&self) -> usize {
            self.cells.iter().filter(|&&c| c).count()
        }

        pub fn any(&self) -> bool {
            self.cells.iter().any(|&c| c)
        }

        /// Same-shape grid keeping only the cells inside `rows` x `cols`.
        pub fn window(&self, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> Grid<bool> {
            Grid::from_fn(self.width, self.height, |x, y| {
                rows.contains(&y) && cols.contains(&x) && self.get(x, y)
            })
        }
    }

    impl Grid<f32> {
        /// Mean over every cell, 0.0 for an empty grid.
        pub fn mean(&self) -> f64 {
            if self.cells.is_empty() {
                return 0.0;
            }
            self.cells.iter().map(|&v| v as f64).sum::<f64>() / self.cells.len() as f64
        }

        /// Mean over the cells where `selection` is true, `None` when nothing is selected
        /// or the shapes differ.
        pub fn masked_mean(&self, selection: &Grid<bool>) -> Option<f64> {
            if !self.same_shape(selection) {
                return None;
            }
            let (sum, count) = self
                .cells
                .iter()
                .zip(selection.cells())
                .filter(|(_, selected)| **selected)
                .fold((0.0f64, 0usize), |(sum, count), (&v, _)| (sum + v as f64, count + 1));
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        }
    }

}
