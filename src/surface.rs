//! Correlation surfaces and their extrema.

use crate::image::ImageView;
use crate::util::{RegError, RegResult};

/// Which direction of a score is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Better {
    /// Larger scores are better (correlation, mutual information).
    Max,
    /// Smaller scores are better (squared differences).
    Min,
}

/// Best cell of a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extremum {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// Scores of every template placement inside a search window.
///
/// Cell `(x, y)` holds the score with the template's top-left corner at
/// `(x, y)` of the search window.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationSurface {
    data: Vec<f32>,
    width: usize,
    height: usize,
    better: Better,
}

impl CorrelationSurface {
    /// Wraps a row-major buffer of scores.
    pub fn new(data: Vec<f32>, width: usize, height: usize, better: Better) -> RegResult<Self> {
        if width == 0 || height == 0 {
            return Err(RegError::InvalidDimensions { width, height });
        }
        if data.len() != width * height {
            return Err(RegError::BufferTooSmall {
                needed: width * height,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            better,
        })
    }

    /// Surface width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Surface height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Better direction for the stored scores.
    pub fn better(&self) -> Better {
        self.better
    }

    /// Row-major scores.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Borrowed view of the scores.
    pub fn view(&self) -> RegResult<ImageView<'_, f32>> {
        ImageView::from_slice(&self.data, self.width, self.height)
    }

    /// Score at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Maps a score so that larger is always better.
    #[inline]
    pub(crate) fn oriented(&self, value: f32) -> f32 {
        match self.better {
            Better::Max => value,
            Better::Min => -value,
        }
    }

    /// Best finite cell; ties keep the first cell in row-major order.
    pub fn extremum(&self) -> Option<Extremum> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &value) in self.data.iter().enumerate() {
            if !value.is_finite() {
                continue;
            }
            let oriented = self.oriented(value);
            match best {
                Some((_, b)) if oriented <= b => {}
                _ => best = Some((idx, oriented)),
            }
        }
        best.map(|(idx, _)| Extremum {
            x: idx % self.width,
            y: idx / self.width,
            score: self.data[idx],
        })
    }

    /// True when `(x, y)` lies on the outer row or column.
    pub fn is_on_edge(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 >= self.width || y + 1 >= self.height
    }

    /// Oriented `(2r+1)^2` scores centered on `(x, y)`, or `None` when they leave the surface.
    pub fn neighborhood(&self, x: usize, y: usize, radius: usize) -> Option<Neighborhood> {
        if x < radius || y < radius || x + radius >= self.width || y + radius >= self.height {
            return None;
        }
        let side = 2 * radius + 1;
        let mut values = Vec::with_capacity(side * side);
        for ny in (y - radius)..=(y + radius) {
            let row = &self.data[ny * self.width..(ny + 1) * self.width];
            for &v in &row[(x - radius)..=(x + radius)] {
                values.push(self.oriented(v));
            }
        }
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Neighborhood { radius, values })
    }
}

/// Square block of oriented scores around an extremum.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighborhood {
    radius: usize,
    values: Vec<f32>,
}

impl Neighborhood {
    /// Half side length.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Side length `2r + 1`.
    pub fn side(&self) -> usize {
        2 * self.radius + 1
    }

    /// Oriented score at local `(i, j)`, with `(r, r)` the center.
    pub fn at(&self, i: usize, j: usize) -> f32 {
        self.values[j * self.side() + i]
    }

    /// Row-major oriented scores.
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(better: Better) -> CorrelationSurface {
        let data: Vec<f32> = (0..25).map(|i| if i == 12 { 5.0 } else { i as f32 * 0.1 }).collect();
        CorrelationSurface::new(data, 5, 5, better).unwrap()
    }

    #[test]
    fn extremum_respects_direction() {
        let max = surface(Better::Max).extremum().unwrap();
        assert_eq!((max.x, max.y), (2, 2));
        let min = surface(Better::Min).extremum().unwrap();
        assert_eq!((min.x, min.y), (0, 0));
    }

    #[test]
    fn neighborhood_requires_room() {
        let s = surface(Better::Max);
        assert!(s.neighborhood(2, 2, 2).is_some());
        assert!(s.neighborhood(1, 2, 2).is_none());
        assert!(s.neighborhood(2, 3, 2).is_none());
        assert!(s.is_on_edge(4, 2));
        assert!(!s.is_on_edge(2, 2));
    }

    #[test]
    fn extremum_skips_nan() {
        let s = CorrelationSurface::new(vec![f32::NAN, 0.2, 0.1, 0.0], 2, 2, Better::Max).unwrap();
        let e = s.extremum().unwrap();
        assert_eq!((e.x, e.y), (1, 0));
    }
}
