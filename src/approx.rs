//! # 数值近似表（sigmoid / log 查表）
//!
//! 训练热路径上每个样本要算几十次 sigmoid 和 log，这里在构造时预计算
//! 513 个采样点，之后只做一次乘法和取整：
//!
//! ```text
//! sigmoid: x ∈ [-8, 8]   → t_sigmoid[floor((x + 8) * 512 / 16)]
//! log:     x ∈ [0, 1]    → t_log[floor(x * 512)]
//! ```
//!
//! 误差上界约为一个采样步长内函数的变化量；区间外直接截断为 0/1。

use crate::{LOG_TABLE_SIZE, MAX_SIGMOID, STABLE_LOG_EPSILON, SIGMOID_TABLE_SIZE};

#[derive(Clone, Debug)]
pub struct ApproxTables {
    t_sigmoid: Vec<f32>,
    t_log: Vec<f32>,
}

impl Default for ApproxTables {
    fn default() -> Self {
        Self::new()
    }
}

impl ApproxTables {
    pub fn new() -> Self {
        let t_sigmoid = (0..=SIGMOID_TABLE_SIZE)
            .map(|i| {
                let x = (i as f32 * 2.0 * MAX_SIGMOID) / SIGMOID_TABLE_SIZE as f32 - MAX_SIGMOID;
                1.0 / (1.0 + (-x).exp())
            })
            .collect();
        let t_log = (0..=LOG_TABLE_SIZE)
            .map(|i| ((i as f32 + 1e-5) / LOG_TABLE_SIZE as f32).ln())
            .collect();
        Self { t_sigmoid, t_log }
    }

    #[inline]
    pub fn sigmoid(&self, x: f32) -> f32 {
        if x < -MAX_SIGMOID {
            0.0
        } else if x > MAX_SIGMOID {
            1.0
        } else {
            let i = ((x + MAX_SIGMOID) * SIGMOID_TABLE_SIZE as f32 / MAX_SIGMOID / 2.0) as usize;
            self.t_sigmoid[i.min(SIGMOID_TABLE_SIZE)]
        }
    }

    /// 略大于 1 的概率（浮点误差）返回 0
    #[inline]
    pub fn log(&self, x: f32) -> f32 {
        if x > 1.0 {
            return 0.0;
        }
        let i = (x.max(0.0) * LOG_TABLE_SIZE as f32) as usize;
        self.t_log[i.min(LOG_TABLE_SIZE)]
    }
}

/// 不查表的 `ln(x + 1e-5)`，预测排序时使用，避免表分辨率打乱名次
#[inline]
pub fn stable_log(x: f32) -> f32 {
    (x + STABLE_LOG_EPSILON).ln()
}

#[inline]
pub fn exact_sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_table_error_bound() {
        let tables = ApproxTables::new();
        let step = 2.0 * MAX_SIGMOID / SIGMOID_TABLE_SIZE as f32;
        let mut x = -MAX_SIGMOID;
        while x <= MAX_SIGMOID {
            let err = (tables.sigmoid(x) - exact_sigmoid(x)).abs();
            // 一个步长内 sigmoid 的最大斜率是 1/4
            assert!(err <= step / 4.0 + 1e-6, "x={x} err={err}");
            x += 0.01;
        }
    }

    #[test]
    fn test_sigmoid_saturates() {
        let tables = ApproxTables::new();
        assert_eq!(tables.sigmoid(-8.01), 0.0);
        assert_eq!(tables.sigmoid(-100.0), 0.0);
        assert_eq!(tables.sigmoid(8.01), 1.0);
        assert_eq!(tables.sigmoid(f32::MAX), 1.0);
    }

    #[test]
    fn test_log_table() {
        let tables = ApproxTables::new();
        assert_eq!(tables.log(1.0000001), 0.0);
        assert!((tables.log(0.5) - 0.5f32.ln()).abs() < 1e-3);
        assert!(tables.log(0.0).is_finite());
        assert!(tables.log(0.0) < -10.0);
    }

    #[test]
    fn test_stable_log() {
        assert!(stable_log(0.0).is_finite());
        assert!((stable_log(1.0) - (1.0f32 + 1e-5).ln()).abs() < 1e-7);
    }
}
