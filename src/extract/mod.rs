use std::path::Path;

use crate::error::FaceError;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxExtractor;

/// 定长的人脸嵌入向量
pub type Embedding = Vec<f32>;

/// 人脸检测框，像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// 按检测框裁剪图片，越界部分收缩到图片内，最小保留 1x1
    pub fn crop(&self, img: &image::RgbImage) -> image::RgbImage {
        let (iw, ih) = (img.width(), img.height());
        let x = (self.x1.max(0.0) as u32).min(iw.saturating_sub(1));
        let y = (self.y1.max(0.0) as u32).min(ih.saturating_sub(1));
        let w = ((self.x2.min(iw as f32) as u32).saturating_sub(x)).max(1);
        let h = ((self.y2.min(ih as f32) as u32).saturating_sub(y)).max(1);
        image::imageops::crop_imm(img, x, y, w, h).to_image()
    }
}

/// 一张检测到的人脸：检测框加上嵌入向量
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: FaceBox,
    pub embedding: Embedding,
}

/// 人脸检测与嵌入能力
///
/// 管线本身不关心模型实现，只依赖这个接口。实现必须可以跨线程共享，
/// 导出管线会在 rayon 线程池内并发调用。
pub trait FeatureExtractor: Send + Sync {
    /// 检测图片中的所有人脸并计算嵌入向量，顺序与检测顺序一致
    fn detect_and_embed(&self, path: &Path) -> Result<Vec<Detection>, FaceError>;

    /// 期望图片中恰好有一张人脸，返回其嵌入向量
    ///
    /// 零张或多张人脸分别返回 [`FaceError::NoFaceDetected`] 和
    /// [`FaceError::MultipleFacesDetected`]，并携带图片路径。
    fn embed_single_expected(&self, path: &Path) -> Result<Embedding, FaceError> {
        let mut faces = self.detect_and_embed(path)?;
        match faces.len() {
            0 => Err(FaceError::NoFaceDetected { path: path.to_path_buf() }),
            1 => Ok(faces.remove(0).embedding),
            _ => Err(FaceError::MultipleFacesDetected { path: path.to_path_buf() }),
        }
    }
}
