//! 单元测试共用的桩实现：把文本文件当成"图片"，
//! 每个非空行解析为一张人脸的嵌入向量。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::FaceError;
use crate::extract::{Detection, FaceBox, FeatureExtractor};

/// 文本桩提取器
///
/// 空文件表示没有人脸，多行表示多张人脸，
/// 无法解析为浮点数的内容视为损坏图片。
pub(crate) struct TextExtractor;

impl FeatureExtractor for TextExtractor {
    fn detect_and_embed(&self, path: &Path) -> Result<Vec<Detection>, FaceError> {
        let text = fs::read_to_string(path).map_err(|e| FaceError::InvalidImage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut faces = Vec::new();
        for (i, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let embedding = line
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| FaceError::InvalidImage {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            let offset = (i * 10) as f32;
            faces.push(Detection {
                bbox: FaceBox { x1: offset, y1: 0.0, x2: offset + 8.0, y2: 8.0 },
                embedding,
            });
        }
        Ok(faces)
    }
}

/// 记录提取次数的包装，用于断言缓存是否命中
#[derive(Default)]
pub(crate) struct CountingExtractor {
    calls: AtomicUsize,
}

impl CountingExtractor {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeatureExtractor for CountingExtractor {
    fn detect_and_embed(&self, path: &Path) -> Result<Vec<Detection>, FaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TextExtractor.detect_and_embed(path)
    }
}

/// 写一个单人脸的标注文件，返回其路径
pub(crate) fn write_face(dir: &Path, name: &str, embedding: &[f32]) -> PathBuf {
    let path = dir.join(name);
    let line =
        embedding.iter().map(f32::to_string).collect::<Vec<_>>().join(" ");
    fs::write(&path, format!("{line}\n")).unwrap();
    path
}
