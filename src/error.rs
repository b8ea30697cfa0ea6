//! 错误类型
//!
//! 核心计算路径上的数值边界情况（log(0)、sigmoid 溢出）通过截断处理，不会报错；
//! 这里只覆盖调用方违反前置条件的情况，以及模型快照读写时的 I/O 与编解码错误。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("target {target} out of range (output size {osz})")]
    TargetOutOfRange { target: usize, osz: usize },

    #[error("token {token} out of range (input rows {rows})")]
    TokenOutOfRange { token: usize, rows: usize },

    #[error("expected {expected} target counts, got {actual}")]
    CountsMismatch { expected: usize, actual: usize },

    #[error("{0} tables not built, call set_target_counts first")]
    TablesNotBuilt(&'static str),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl From<bincode::error::EncodeError> for ModelError {
    fn from(e: bincode::error::EncodeError) -> Self {
        ModelError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for ModelError {
    fn from(e: bincode::error::DecodeError) -> Self {
        ModelError::Deserialization(e.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            ModelError::Io(std::io::Error::other(e))
        } else if e.is_data() || e.is_syntax() || e.is_eof() {
            ModelError::Deserialization(e.to_string())
        } else {
            ModelError::Serialization(e.to_string())
        }
    }
}
