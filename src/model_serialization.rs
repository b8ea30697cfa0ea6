// ============================================================================
// 模型快照模块 - 支持二进制和 JSON 两种格式
// ============================================================================
//
// 快照包含配置和两个权重矩阵（嵌入矩阵、输出矩阵）。Huffman 树与负采样表
// 不保存：它们由输出类别频次确定性地重建（负采样表还依赖实例种子），
// 加载后调用 `Model::set_target_counts` 即可。
//
// 1. **二进制格式** (推荐用于生产):
//    - 使用 bincode 序列化,文件小、速度快
//    - 文件扩展名: .bin
//
// 2. **JSON 格式** (推荐用于调试):
//    - 人类可读,方便检查权重
//    - 文件扩展名: .json
//
// ============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::{
    args::Args,
    error::{ModelError, Result},
    matrix::Matrix,
    model::Model,
};

pub const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// 矩阵的可序列化表示
// ============================================================================

#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct SerializableMatrix {
    pub shape: (usize, usize),
    pub data: Vec<f32>,
}

impl SerializableMatrix {
    pub fn from_matrix(matrix: &Matrix) -> Self {
        Self {
            shape: (matrix.rows(), matrix.cols()),
            data: matrix
                .to_vec()
                .into_iter()
                .map(|x| if x.is_finite() { x } else { 0.0 })
                .collect(),
        }
    }

    pub fn to_matrix(&self) -> Result<Matrix> {
        Matrix::from_shape_vec(self.shape, self.data.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// 保存时间戳
    pub saved_at: String,
    /// 保存时实例已训练的样本数
    pub nexamples: u64,
    /// 保存时的平均 loss
    pub loss: f32,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u32,
    pub args: Args,
    pub input: SerializableMatrix,
    pub output: SerializableMatrix,
    pub metadata: SnapshotMetadata,
}

impl ModelSnapshot {
    pub fn from_model(model: &Model) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            args: model.args().clone(),
            input: SerializableMatrix::from_matrix(model.input_matrix()),
            output: SerializableMatrix::from_matrix(model.output_matrix()),
            metadata: SnapshotMetadata {
                saved_at: chrono::Local::now().to_rfc3339(),
                nexamples: model.nexamples(),
                loss: model.loss(),
            },
        }
    }

    /// 重建共享权重与配置，交给 `Model::new`
    pub fn into_parts(self) -> Result<(Arc<Matrix>, Arc<Matrix>, Arc<Args>)> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ModelError::Deserialization(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        self.args.validate()?;
        let wi = self.input.to_matrix()?;
        let wo = self.output.to_matrix()?;
        Ok((Arc::new(wi), Arc::new(wo), Arc::new(self.args)))
    }
}

// ============================================================================
// 主要 API
// ============================================================================

/// 保存快照到二进制文件
pub fn save_snapshot_binary<P: AsRef<Path>>(snapshot: &ModelSnapshot, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    let config = bincode::config::standard();
    bincode::encode_into_std_write(snapshot, &mut writer, config)?;

    let file_size = std::fs::metadata(path.as_ref())?.len();
    log::info!(
        "💾 快照已保存: {} ({:.2} MB)",
        path.as_ref().display(),
        file_size as f64 / 1_048_576.0
    );
    Ok(())
}

/// 从二进制文件加载快照
pub fn load_snapshot_binary<P: AsRef<Path>>(path: P) -> Result<ModelSnapshot> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);

    let config = bincode::config::standard();
    let snapshot: ModelSnapshot = bincode::decode_from_std_read(&mut reader, config)?;

    log::info!(
        "📂 快照已加载: {} (版本 {}, input {:?}, output {:?})",
        path.as_ref().display(),
        snapshot.version,
        snapshot.input.shape,
        snapshot.output.shape
    );
    Ok(snapshot)
}

/// 保存快照到 JSON 文件
pub fn save_snapshot_json<P: AsRef<Path>>(snapshot: &ModelSnapshot, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot)?;
    log::info!("💾 快照已导出为 JSON: {}", path.as_ref().display());
    Ok(())
}

/// 从 JSON 文件加载快照
pub fn load_snapshot_json<P: AsRef<Path>>(path: P) -> Result<ModelSnapshot> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
    log::info!("📂 JSON 快照已加载: {}", path.as_ref().display());
    Ok(snapshot)
}

/// 按扩展名自动选择加载方法
pub fn load_snapshot_auto<P: AsRef<Path>>(path: P) -> Result<ModelSnapshot> {
    let is_json = path
        .as_ref()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        load_snapshot_json(path)
    } else {
        load_snapshot_binary(path)
    }
}
