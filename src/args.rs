//! # 模型配置（Args）
//!
//! 模型核心只关心其中一小部分字段：嵌入维度、损失类型、负样本数、模型类型、
//! 日志详细程度、是否量化输出层。其余字段（学习率、轮数、窗口等）供外层训练调度使用，
//! 一并放在这里方便用同一份 JSON 配置驱动整个训练过程。
//!
//! ```text
//! {
//!   "dim": 100,
//!   "loss": "hs",
//!   "model": "sup",
//!   "neg": 5
//! }
//! ```

use std::fs;
use std::path::Path;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::{
    NEGATIVE_TABLE_SIZE,
    error::{ModelError, Result},
};

/// **损失函数类型**
///
/// 每个模型实例在构造时确定一种，之后不再切换。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossName {
    /// 层次 softmax：沿 Huffman 树路径做二分类，单样本代价 O(log osz)
    Hs,
    /// 负采样：真实目标 + `neg` 个采样的非目标
    Ns,
    /// 完整 softmax：对全部输出类别归一化
    Softmax,
}

/// **模型类型**
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelName {
    /// 连续词袋（词向量训练）
    Cbow,
    /// Skip-gram（词向量训练）
    Skipgram,
    /// 有监督文本分类，唯一支持预测的模式
    Sup,
}

impl ModelName {
    pub fn is_supervised(&self) -> bool {
        matches!(self, ModelName::Sup)
    }
}

#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
#[serde(default)]
pub struct Args {
    /// 嵌入维度（隐藏向量长度 hsz）
    pub dim: usize,
    pub loss: LossName,
    pub model: ModelName,
    /// 每个正样本对应的负样本个数
    pub neg: usize,
    /// 0 静默，1 进度，2 统计信息，>2 逐样本调试日志
    pub verbose: u8,
    /// 推理时输出层也使用量化矩阵
    pub qout: bool,
    /// 模型实例随机数种子（负采样表洗牌）
    pub seed: u64,
    pub negative_table_size: usize,
    pub lr: f32,
    pub epoch: usize,
    pub ws: usize,
    pub thread: usize,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            dim: 100,
            loss: LossName::Ns,
            model: ModelName::Skipgram,
            neg: 5,
            verbose: 2,
            qout: false,
            seed: 0,
            negative_table_size: NEGATIVE_TABLE_SIZE,
            lr: 0.05,
            epoch: 5,
            ws: 5,
            thread: 12,
        }
    }
}

impl Args {
    /// 有监督分类的常用默认值：softmax 损失，更大的学习率
    pub fn supervised() -> Self {
        Self {
            model: ModelName::Sup,
            loss: LossName::Softmax,
            lr: 0.1,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let args: Args = serde_json::from_str(json)?;
        args.validate()?;
        Ok(args)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        log::info!("读取配置: {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(ModelError::InvalidArgument(
                "dim needs to be 1 or higher".to_string(),
            ));
        }
        if self.negative_table_size == 0 {
            return Err(ModelError::InvalidArgument(
                "negative_table_size needs to be 1 or higher".to_string(),
            ));
        }
        if !self.lr.is_finite() || self.lr < 0.0 {
            return Err(ModelError::InvalidArgument(format!(
                "lr must be a non-negative number, got {}",
                self.lr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let args = Args::from_json_str(r#"{"dim": 16, "loss": "hs", "model": "sup"}"#).unwrap();
        assert_eq!(args.dim, 16);
        assert_eq!(args.loss, LossName::Hs);
        assert!(args.model.is_supervised());
        assert_eq!(args.neg, 5);
        assert_eq!(args.negative_table_size, NEGATIVE_TABLE_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_dim() {
        let err = Args::from_json_str(r#"{"dim": 0}"#);
        assert!(matches!(err, Err(ModelError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_loss_name() {
        assert!(Args::from_json_str(r#"{"loss": "adam"}"#).is_err());
    }
}
