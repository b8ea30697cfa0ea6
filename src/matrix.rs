//! # 共享权重矩阵（Shared Weight Matrix）
//!
//! 嵌入矩阵与输出矩阵在所有工作线程之间共享（`Arc<Matrix>`），每个线程持有自己的
//! `Model` 实例，并以行为单位原地累加梯度。
//!
//! ## 无锁更新（Hogwild）
//!
//! 每个元素存成 `AtomicU32`（f32 的位模式），读写都使用 `Ordering::Relaxed`：
//!
//! ```text
//! 线程 A: row[5] += alpha_a * hidden_a
//! 线程 B: row[5] += alpha_b * hidden_b
//! ```
//!
//! 两个线程同时写同一行时，重叠部分以最后一次写入为准（丢失部分更新），
//! 写不同行则互不影响。这是异步 SGD 的近似，不加锁；收敛行为依赖于此。
//! 与直接共享 `&mut [f32]` 不同，这里没有数据竞争的未定义行为。

use std::sync::atomic::{AtomicU32, Ordering};

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ModelError, Result};

#[derive(Default)]
#[repr(transparent)]
struct Cell {
    bits: AtomicU32,
}

impl Cell {
    fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn add(&self, x: f32) {
        let a = self.get();
        self.set(a + x);
    }
}

/// **行主序稠密矩阵**，形状 (rows, cols)
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Cell>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        data.resize_with(rows * cols, Cell::default);
        Self { rows, cols, data }
    }

    /// **均匀分布初始化** U(-bound, bound)
    ///
    /// 嵌入矩阵通常用 `bound = 1 / dim`，输出矩阵用全零。
    /// 相同的 `seed` 得到完全相同的矩阵。
    pub fn uniform(rows: usize, cols: usize, bound: f32, seed: u64) -> Self {
        if bound <= 0.0 {
            return Self::zeros(rows, cols);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..rows * cols)
            .map(|_| Cell::new(rng.random_range(-bound..bound)))
            .collect();
        Self { rows, cols, data }
    }

    pub fn from_array2(array: &Array2<f32>) -> Self {
        let (rows, cols) = array.dim();
        let data = array.iter().map(|&x| Cell::new(x)).collect();
        Self { rows, cols, data }
    }

    pub fn from_shape_vec(shape: (usize, usize), values: Vec<f32>) -> Result<Self> {
        let (rows, cols) = shape;
        if values.len() != rows * cols {
            return Err(ModelError::ShapeMismatch(format!(
                "{} values for a {}x{} matrix",
                values.len(),
                rows,
                cols
            )));
        }
        let data = values.into_iter().map(Cell::new).collect();
        Ok(Self { rows, cols, data })
    }

    /// 快照当前权重（并发写入期间调用得到的是某个中间状态）
    pub fn to_array2(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.rows, self.cols), |(i, j)| self.get(i, j))
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().map(Cell::get).collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.cols + j].get()
    }

    pub fn row(&self, i: usize) -> Array1<f32> {
        Array1::from_iter(self.row_cells(i).iter().map(Cell::get))
    }

    #[inline]
    fn row_cells(&self, i: usize) -> &[Cell] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// **行点积**：`W[i] · vec`
    #[inline]
    pub fn dot_row(&self, vec: &Array1<f32>, i: usize) -> f32 {
        debug_assert_eq!(vec.len(), self.cols);
        self.row_cells(i)
            .iter()
            .zip(vec.iter())
            .map(|(c, &v)| c.get() * v)
            .sum()
    }

    /// **原地行更新**：`W[i] += scale * vec`
    ///
    /// 训练期间修改权重的唯一入口。
    #[inline]
    pub fn add_row(&self, vec: &Array1<f32>, i: usize, scale: f32) {
        debug_assert_eq!(vec.len(), self.cols);
        for (c, &v) in self.row_cells(i).iter().zip(vec.iter()) {
            c.add(scale * v);
        }
    }

    /// **把一行加到向量上**：`target += scale * W[i]`
    #[inline]
    pub fn add_row_to(&self, target: &mut Array1<f32>, i: usize, scale: f32) {
        debug_assert_eq!(target.len(), self.cols);
        for (t, c) in target.iter_mut().zip(self.row_cells(i)) {
            *t += scale * c.get();
        }
    }

    /// **矩阵-向量乘法**：`out = W · vec`
    pub fn mul_vector(&self, vec: &Array1<f32>, out: &mut Array1<f32>) {
        debug_assert_eq!(out.len(), self.rows);
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.dot_row(vec, i);
        }
    }
}

impl Clone for Matrix {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|c| Cell::new(c.get())).collect(),
        }
    }
}

impl std::fmt::Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ndarray::array;

    use super::*;

    #[test]
    fn test_row_primitives() {
        let m = Matrix::from_array2(&array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let v = array![1.0, -1.0];

        assert_eq!(m.dot_row(&v, 1), -1.0);

        m.add_row(&v, 0, 0.5);
        assert_eq!(m.row(0), array![1.5, 1.5]);

        let mut acc = Array1::zeros(2);
        m.add_row_to(&mut acc, 2, 2.0);
        assert_eq!(acc, array![10.0, 12.0]);

        let mut out = Array1::zeros(3);
        m.mul_vector(&v, &mut out);
        assert_eq!(out, array![0.0, -1.0, -1.0]);
    }

    #[test]
    fn test_uniform_is_seeded() {
        let a = Matrix::uniform(4, 3, 0.25, 7);
        let b = Matrix::uniform(4, 3, 0.25, 7);
        assert_eq!(a.to_vec(), b.to_vec());
        assert!(a.to_vec().iter().all(|x| x.abs() <= 0.25));
    }

    #[test]
    fn test_from_shape_vec_mismatch() {
        assert!(Matrix::from_shape_vec((2, 2), vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_disjoint_rows_from_threads() {
        let m = Arc::new(Matrix::zeros(4, 8));
        std::thread::scope(|s| {
            for row in 0..4 {
                let m = Arc::clone(&m);
                s.spawn(move || {
                    let ones = Array1::ones(8);
                    for _ in 0..100 {
                        m.add_row(&ones, row, 1.0);
                    }
                });
            }
        });
        assert!(m.to_vec().iter().all(|&x| x == 100.0));
    }
}
