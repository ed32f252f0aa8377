use std::path::Path;

use image::RgbImage;
use image::imageops::FilterType;
use log::info;
use tract_onnx::prelude::*;

use crate::error::FaceError;
use crate::extract::{Detection, Embedding, FaceBox, FeatureExtractor};

/// 检测模型的固定输入尺寸（UltraFace 320）
const DET_WIDTH: u32 = 320;
const DET_HEIGHT: u32 = 240;
/// 嵌入模型的输入尺寸
const REC_SIZE: u32 = 112;
/// NMS 去重的 IoU 上限
const IOU_THRESHOLD: f32 = 0.4;

type OnnxModel = TypedRunnableModel<TypedModel>;

/// 基于 tract-onnx 的特征提取器
///
/// 检测模型接受 1x3x240x320 输入，输出 (1,N,2) 置信度和
/// (1,N,4) 归一化角点坐标；嵌入模型接受 1x3x112x112 的人脸裁剪。
/// 推理是纯 CPU 的，`run` 只需要共享引用，可以在线程池内直接并发调用。
pub struct OnnxExtractor {
    detector: OnnxModel,
    recognizer: OnnxModel,
    confidence: f32,
}

impl OnnxExtractor {
    pub fn load(detector: &Path, recognizer: &Path, confidence: f32) -> anyhow::Result<Self> {
        info!("加载检测模型: {}", detector.display());
        let detector = tract_onnx::onnx()
            .model_for_path(detector)?
            .with_input_fact(0, f32::fact([1, 3, DET_HEIGHT as usize, DET_WIDTH as usize]).into())?
            .into_optimized()?
            .into_runnable()?;

        info!("加载嵌入模型: {}", recognizer.display());
        let recognizer = tract_onnx::onnx()
            .model_for_path(recognizer)?
            .with_input_fact(0, f32::fact([1, 3, REC_SIZE as usize, REC_SIZE as usize]).into())?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { detector, recognizer, confidence })
    }

    fn detect(&self, img: &RgbImage) -> TractResult<Vec<FaceBox>> {
        let resized = image::imageops::resize(img, DET_WIDTH, DET_HEIGHT, FilterType::Triangle);
        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 3, DET_HEIGHT as usize, DET_WIDTH as usize),
            |(_, c, y, x)| (resized.get_pixel(x as u32, y as u32)[c] as f32 - 127.0) / 128.0,
        )
        .into();
        let outputs = self.detector.run(tvec!(input.into()))?;
        let scores = outputs[0].to_array_view::<f32>()?;
        let boxes = outputs[1].to_array_view::<f32>()?;

        let (iw, ih) = (img.width() as f32, img.height() as f32);
        let mut candidates = Vec::new();
        for i in 0..scores.shape()[1] {
            let score = scores[[0, i, 1]];
            if score < self.confidence {
                continue;
            }
            let bbox = FaceBox {
                x1: boxes[[0, i, 0]] * iw,
                y1: boxes[[0, i, 1]] * ih,
                x2: boxes[[0, i, 2]] * iw,
                y2: boxes[[0, i, 3]] * ih,
            };
            candidates.push((score, bbox));
        }
        Ok(nms(candidates))
    }

    fn embed(&self, img: &RgbImage, bbox: &FaceBox) -> TractResult<Embedding> {
        let crop = bbox.crop(img);
        let face = image::imageops::resize(&crop, REC_SIZE, REC_SIZE, FilterType::Triangle);

        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 3, REC_SIZE as usize, REC_SIZE as usize),
            |(_, c, y, x)| (face.get_pixel(x as u32, y as u32)[c] as f32 - 127.5) / 128.0,
        )
        .into();
        let outputs = self.recognizer.run(tvec!(input.into()))?;
        let view = outputs[0].to_array_view::<f32>()?;
        Ok(view.iter().copied().collect())
    }
}

impl FeatureExtractor for OnnxExtractor {
    fn detect_and_embed(&self, path: &Path) -> Result<Vec<Detection>, FaceError> {
        let img = image::open(path)
            .map_err(|e| FaceError::InvalidImage {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        let boxes = self.detect(&img).map_err(|e| FaceError::Model(e.to_string()))?;
        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let embedding =
                self.embed(&img, &bbox).map_err(|e| FaceError::Model(e.to_string()))?;
            faces.push(Detection { bbox, embedding });
        }
        Ok(faces)
    }
}

/// 按置信度从高到低保留，与已保留框重叠过大的候选丢弃
fn nms(mut candidates: Vec<(f32, FaceBox)>) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut kept: Vec<FaceBox> = Vec::new();
    for (_, bbox) in candidates {
        if kept.iter().all(|k| iou(k, &bbox) < IOU_THRESHOLD) {
            kept.push(bbox);
        }
    }
    kept
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = ix * iy;
    let union = a.width() * a.height() + b.width() * b.height() - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2 }
    }

    #[test]
    fn nms_drops_overlapping_boxes() {
        let candidates = vec![
            (0.9, bbox(0.0, 0.0, 10.0, 10.0)),
            (0.8, bbox(1.0, 1.0, 11.0, 11.0)),
            (0.7, bbox(50.0, 50.0, 60.0, 60.0)),
        ];
        let kept = nms(candidates);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], bbox(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        assert_eq!(iou(&bbox(0.0, 0.0, 1.0, 1.0), &bbox(5.0, 5.0, 6.0, 6.0)), 0.0);
    }
}
