use std::path::{Path, PathBuf};

use thiserror::Error;

/// 人脸检测与分类管线中的错误类型
///
/// 校验阶段产生的错误会携带出错的图片路径，
/// 导出管线的 Crash 策略依赖该路径执行隔离重试。
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("未检测到人脸: {path}")]
    NoFaceDetected { path: PathBuf },
    #[error("检测到多张人脸: {path}")]
    MultipleFacesDetected { path: PathBuf },
    #[error("无法读取图片 {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },
    #[error("模型推理失败: {0}")]
    Model(String),
}

impl FaceError {
    /// 返回出错的图片路径（如果有）
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NoFaceDetected { path }
            | Self::MultipleFacesDetected { path }
            | Self::InvalidImage { path, .. } => Some(path),
            Self::Model(_) => None,
        }
    }
}
