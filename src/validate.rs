use std::fs;
use std::path::Path;

use clap::ValueEnum;
use log::warn;

use crate::error::FaceError;
use crate::extract::FeatureExtractor;
use crate::utils;

/// 标注数据不合法时的处理策略
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// 打印警告并继续
    Warn,
    /// 删除违规文件并继续
    Remove,
    /// 立即中止校验，错误中携带违规文件路径
    Crash,
}

/// 校验标注目录：每张图片必须恰好包含一张可检测的人脸
///
/// Warn 和 Remove 策略在内部消化所有违规，总是正常返回；
/// Crash 策略在第一个违规处返回错误，由调用方决定如何恢复。
pub fn validate_labels(
    extractor: &dyn FeatureExtractor,
    labeled_dir: &Path,
    conflict: Conflict,
) -> Result<(), FaceError> {
    for path in utils::image_paths(labeled_dir) {
        if let Err(e) = extractor.embed_single_expected(&path) {
            match conflict {
                Conflict::Warn => warn!("标注图片无效: {e}"),
                Conflict::Remove => {
                    warn!("标注图片无效，删除: {}", path.display());
                    // 对应 missing_ok 语义，文件已不存在时不视为失败
                    let _ = fs::remove_file(&path);
                }
                Conflict::Crash => return Err(e),
            }
        }
    }
    Ok(())
}
