/// 工具函数模块
///
/// 输出分布计算用到的数值稳定 softmax
use ndarray::Array1;

use crate::SOFTMAX_EPSILON;

/// 原地 Softmax
///
/// 将 logits 转换为概率分布，结果非负且和为 1。
///
/// # 数值稳定性
/// 1. 先减去最大值，避免 exp 溢出（logit 很大时直接 exp 会得到 inf）
/// 2. 除以总和时添加 epsilon，避免除零错误
pub fn softmax_in_place(logits: &mut Array1<f32>) {
    if logits.is_empty() {
        return;
    }

    // 找到最大值（用于数值稳定）
    let max_val = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    // 计算exp(x - max)
    logits.mapv_inplace(|x| (x - max_val).exp());

    // 归一化
    let sum_exp: f32 = logits.sum();
    logits.mapv_inplace(|x| x / sum_exp.max(SOFTMAX_EPSILON));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_basic() {
        let mut output = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        softmax_in_place(&mut output);

        let sum: f32 = output.sum();
        assert!((sum - 1.0).abs() < 1e-6, "Sum should be 1.0, got {}", sum);

        // 检查所有值在[0, 1]区间
        for &val in output.iter() {
            assert!(
                (0.0..=1.0).contains(&val),
                "Value should be in [0, 1], got {}",
                val
            );
        }

        // 单调性保持不变
        for i in 1..output.len() {
            assert!(output[i] > output[i - 1]);
        }
    }

    #[test]
    fn test_softmax_numerical_stability() {
        // 测试大数值的稳定性
        let mut output = Array1::from_vec(vec![1000.0, 1001.0, 1002.0]);
        softmax_in_place(&mut output);

        // 应该不会产生NaN或Inf
        for &val in output.iter() {
            assert!(val.is_finite(), "Value should be finite, got {}", val);
        }
        assert!((output.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_empty() {
        let mut output = Array1::<f32>::zeros(0);
        softmax_in_place(&mut output);
        assert!(output.is_empty());
    }
}
