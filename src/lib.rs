//! # fasttext-core - 浅层线性文本模型的训练与推理核心
//!
//! 把离散的输入 token 映射为稠密隐藏向量，再映射为输出词表上的概率分布，
//! 用于词向量训练与文本分类。
//!
//! ## 核心设计理念
//!
//! 1. **浅层线性**：隐藏层就是输入嵌入的平均，没有非线性变换
//! 2. **三种输出层**：负采样、层次 softmax、完整 softmax，构造时选定
//! 3. **无锁并行**：每个工作线程一个 `Model`，共享权重矩阵按行原地更新（Hogwild）
//! 4. **热路径查表**：sigmoid / log 预计算，训练时不调用超越函数
//!
//! ## 模块组织
//!
//! ### 核心
//! - `model`: 隐藏向量、损失策略、SGD 更新、top-k 预测
//! - `huffman`: 层次 softmax 使用的 Huffman 编码树
//! - `negatives`: 按 sqrt(频次) 加权的负采样表
//! - `top_k`: 有界最小堆
//! - `approx`: sigmoid / log 查表
//!
//! ### 协作组件
//! - `matrix`: 线程间共享的权重矩阵（原子单元、按行更新）
//! - `quant_matrix`: 推理用 int8 量化矩阵
//! - `args`: 配置
//! - `model_serialization`: 权重快照的二进制 / JSON 保存与加载
//! - `error`: 错误类型
//! - `utils`: 数值稳定 softmax

// ============================================================================
// 模块声明
// ============================================================================

pub mod approx; // 数值近似表：sigmoid / log 查表
pub mod args; // 配置：维度、损失类型、模型类型等
pub mod error; // 错误类型
pub mod huffman; // Huffman 树：层次 softmax 的路径与编码
pub mod matrix; // 共享权重矩阵
pub mod model; // 模型核心：训练与预测
pub mod model_serialization; // 快照：保存和加载权重
pub mod negatives; // 负采样表
pub mod quant_matrix; // 量化矩阵：推理专用
pub mod top_k; // 有界最小堆
pub mod utils; // 工具函数

// ============================================================================
// 重导出核心类型（简化外部使用）
// ============================================================================

pub use args::{Args, LossName, ModelName};
pub use error::{ModelError, Result};
pub use huffman::HuffmanTree;
pub use matrix::Matrix;
pub use model::Model;
pub use model_serialization::{
    ModelSnapshot, load_snapshot_auto, load_snapshot_binary, load_snapshot_json,
    save_snapshot_binary, save_snapshot_json,
};
pub use negatives::NegativeTable;
pub use quant_matrix::QuantMatrix;
pub use top_k::TopK;

// ============================================================================
// 查表参数（Approximation Tables）
// ============================================================================

/// **sigmoid 表的采样区间数**
///
/// 表在 [-MAX_SIGMOID, MAX_SIGMOID] 上等距采样 `SIGMOID_TABLE_SIZE + 1` 个点，
/// 步长 16 / 512 = 0.03125，查表误差不超过步长 × 最大斜率 (1/4) ≈ 0.0078。
pub const SIGMOID_TABLE_SIZE: usize = 512;

/// **sigmoid 截断边界**
///
/// σ(8) ≈ 0.99966，区间外直接返回 0 或 1。
pub const MAX_SIGMOID: f32 = 8.0;

/// **log 表的采样区间数**，覆盖 (0, 1]
pub const LOG_TABLE_SIZE: usize = 512;

/// **稳定对数的偏移量**
///
/// 预测排序时计算 ln(p + 1e-5)，避免 p = 0 时得到 -∞。
pub const STABLE_LOG_EPSILON: f32 = 1e-5;

/// **Softmax 归一化专用常量**
///
/// 确保归一化时分母大于0。
pub const SOFTMAX_EPSILON: f32 = 1e-12;

// ============================================================================
// 辅助表参数
// ============================================================================

/// **负采样表默认长度**
///
/// 类别 i 在表中出现约 `sqrt(count_i) / Σ sqrt(count_j) × NEGATIVE_TABLE_SIZE` 次。
/// 表越长，稀有类别的采样比例越准确，但内存占用也越大（每项一个 usize）。
/// 可以通过 `Args::negative_table_size` 调整。
pub const NEGATIVE_TABLE_SIZE: usize = 10_000_000;

/// **Huffman 树内部节点的初始计数**
///
/// 尚未构造的内部节点计数视为无穷大，双指针比较时总是优先选择叶子。
pub const HUFFMAN_COUNT_SENTINEL: i64 = 1_000_000_000_000_000;
