//! # 量化矩阵（推理专用）
//!
//! 每行独立做 int8 对称量化：
//!
//! ```text
//! scale[i] = max(|W[i][j]|) / 127
//! q[i][j]  = clamp(round(W[i][j] / scale[i]), -128, 127)
//! W[i][j] ≈ q[i][j] * scale[i]
//! ```
//!
//! 只读，不参与训练；通过 `Model::set_quantized` 安装后，隐藏向量
//! （以及开启 `qout` 时的输出分布）改用量化权重计算。

use ndarray::Array1;

use crate::matrix::Matrix;

const QUANT_BITS: u8 = 8;

pub struct QuantMatrix {
    rows: usize,
    cols: usize,
    codes: Vec<i8>,
    scales: Vec<f32>,
}

fn row_scale(row: &[f32]) -> f32 {
    let max_val = row.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if max_val == 0.0 {
        return 1.0;
    }
    let max_quant = (1i32 << (QUANT_BITS - 1)) - 1;
    max_val / max_quant as f32
}

fn quantize_value(value: f32, scale: f32) -> i8 {
    let max_val = (1i32 << (QUANT_BITS - 1)) - 1;
    let min_val = -(1i32 << (QUANT_BITS - 1));
    ((value / scale).round() as i32).clamp(min_val, max_val) as i8
}

impl QuantMatrix {
    pub fn quantize(matrix: &Matrix) -> Self {
        let (rows, cols) = (matrix.rows(), matrix.cols());
        let mut codes = Vec::with_capacity(rows * cols);
        let mut scales = Vec::with_capacity(rows);
        for i in 0..rows {
            let row = matrix.row(i).to_vec();
            let scale = row_scale(&row);
            codes.extend(row.iter().map(|&x| quantize_value(x, scale)));
            scales.push(scale);
        }
        log::debug!("量化矩阵 {}x{} 完成", rows, cols);
        Self {
            rows,
            cols,
            codes,
            scales,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn row_codes(&self, i: usize) -> &[i8] {
        &self.codes[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn dot_row(&self, vec: &Array1<f32>, i: usize) -> f32 {
        debug_assert_eq!(vec.len(), self.cols);
        let dot: f32 = self
            .row_codes(i)
            .iter()
            .zip(vec.iter())
            .map(|(&q, &v)| q as f32 * v)
            .sum();
        dot * self.scales[i]
    }

    #[inline]
    pub fn add_row_to(&self, target: &mut Array1<f32>, i: usize, scale: f32) {
        debug_assert_eq!(target.len(), self.cols);
        let s = scale * self.scales[i];
        for (t, &q) in target.iter_mut().zip(self.row_codes(i)) {
            *t += s * q as f32;
        }
    }

    pub fn mul_vector(&self, vec: &Array1<f32>, out: &mut Array1<f32>) {
        debug_assert_eq!(out.len(), self.rows);
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.dot_row(vec, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_quantized_dot_is_close() {
        let m = Matrix::from_array2(&array![[0.5, -0.25, 0.125], [0.0, 0.0, 0.0]]);
        let q = QuantMatrix::quantize(&m);
        let v = array![1.0, 2.0, 3.0];

        let exact = m.dot_row(&v, 0);
        let approx = q.dot_row(&v, 0);
        assert!((exact - approx).abs() < 0.5 / 127.0 * 6.0, "{exact} vs {approx}");

        // 全零行 scale 退化为 1.0，结果仍为 0
        assert_eq!(q.dot_row(&v, 1), 0.0);
    }

    #[test]
    fn test_add_row_to() {
        let m = Matrix::from_array2(&array![[1.0, -1.0]]);
        let q = QuantMatrix::quantize(&m);
        let mut acc = Array1::zeros(2);
        q.add_row_to(&mut acc, 0, 2.0);
        assert!((acc[0] - 2.0).abs() < 1e-5);
        assert!((acc[1] + 2.0).abs() < 1e-5);
    }
}
