use std::path::{Path, PathBuf};

use crate::extract::Embedding;

/// 保留的负例标签名，标注为 `none_*` 的图片只用于吸收相似脸，
/// 不会作为分类结果输出
pub const NONE_LABEL: &str = "none";

/// 一条参考数据：一张已标注人脸的身份、来源路径和嵌入向量
///
/// `identity` 为 `None` 表示这是一条负例（保留名 `none`）。
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceItem {
    pub identity: Option<String>,
    pub path: PathBuf,
    pub embedding: Embedding,
}

impl ReferenceItem {
    pub fn new(path: PathBuf, embedding: Embedding) -> Self {
        let identity = identity_of(&path);
        Self { identity, path, embedding }
    }
}

/// 按 `<name>_<index>.<ext>` 的文件名约定推导身份标签
///
/// 返回 `None` 表示该文件属于保留的负例标签，或文件名无法解析。
pub fn identity_of(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.split('_').next().unwrap_or(stem);
    if name.is_empty() || name.eq_ignore_ascii_case(NONE_LABEL) {
        return None;
    }
    Some(name.to_string())
}
