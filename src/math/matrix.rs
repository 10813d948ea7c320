use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

/// Dense row-major `rows × cols` matrix of f64.
///
/// Layer weights are stored as `(fan_in, fan_out)` so that a row vector
/// input multiplies from the left: `y = x · W`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Wraps an existing row-major buffer. Returns `None` when the length
    /// does not match `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Matrix> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Matrix { rows, cols, data })
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms on (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// He initialization: samples from N(0, sqrt(2 / rows)).
    ///
    /// `rows` is the fan-in. Recommended before ReLU/GELU layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let std_dev = (2.0 / rows.max(1) as f64).sqrt();
        Matrix::normal(rows, cols, std_dev, rng)
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Matrix {
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Row vector times matrix: `x (1 × rows) · self (rows × cols)`.
    ///
    /// Skips zero inputs, which are common after ReLU and letterbox padding.
    pub fn vec_mul(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.rows, "vec_mul: input length does not match rows");
        let mut out = vec![0.0; self.cols];
        for (i, &xi) in x.iter().enumerate() {
            if xi == 0.0 {
                continue;
            }
            for (o, &w) in out.iter_mut().zip(self.row(i)) {
                *o += xi * w;
            }
        }
        out
    }

    /// Matrix times column vector: `self (rows × cols) · d (cols)`.
    ///
    /// Used to push a layer delta back through its weights.
    pub fn mul_vec(&self, d: &[f64]) -> Vec<f64> {
        assert_eq!(d.len(), self.cols, "mul_vec: input length does not match cols");
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(d).map(|(w, x)| w * x).sum())
            .collect()
    }

    /// Outer product `a ⊗ b` accumulated into `self` (shape `a.len() × b.len()`).
    pub fn add_outer(&mut self, a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), self.rows);
        assert_eq!(b.len(), self.cols);
        for (i, &ai) in a.iter().enumerate() {
            if ai == 0.0 {
                continue;
            }
            let start = i * self.cols;
            for (g, &bj) in self.data[start..start + self.cols].iter_mut().zip(b) {
                *g += ai * bj;
            }
        }
    }

    /// Element-wise `self += other`.
    pub fn add_assign(&mut self, other: &Matrix) {
        assert_eq!(self.shape(), other.shape(), "Matrices are of incorrect sizes");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|x| *x *= factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn vec_mul_matches_manual_product() {
        // [1 2] · [[1 2 3], [4 5 6]] = [9 12 15]
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.vec_mul(&[1.0, 2.0]), vec![9.0, 12.0, 15.0]);
        assert_eq!(m.mul_vec(&[1.0, 0.0, 1.0]), vec![4.0, 10.0]);
    }

    #[test]
    fn add_outer_accumulates() {
        let mut g = Matrix::zeros(2, 2);
        g.add_outer(&[1.0, 2.0], &[3.0, 4.0]);
        g.add_outer(&[1.0, 0.0], &[1.0, 1.0]);
        assert_eq!(g.data, vec![4.0, 5.0, 6.0, 8.0]);
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let a = Matrix::he(8, 4, &mut ChaCha8Rng::seed_from_u64(7));
        let b = Matrix::he(8, 4, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.shape(), [8, 4]);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(Matrix::from_vec(2, 2, vec![0.0; 3]).is_none());
    }
}
