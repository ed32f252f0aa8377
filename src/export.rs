use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{info, warn};
use rayon::prelude::*;

use crate::annotate;
use crate::cache::EmbeddingCache;
use crate::classify;
use crate::extract::{FaceBox, FeatureExtractor};
use crate::label::ReferenceItem;
use crate::utils::{self, pb_style};
use crate::validate::{Conflict, validate_labels};

/// 隔离目录名，创建在标注目录的同级位置
const QUARANTINE_DIR: &str = "quarantine";

/// 一次批量分类导出任务的全部参数
pub struct ExportJob {
    pub raw_dir: PathBuf,
    pub labeled_dir: PathBuf,
    pub output_dir: PathBuf,
    pub batch_size: usize,
    pub threshold: f32,
    pub conflict: Conflict,
    pub annotate: bool,
}

impl ExportJob {
    /// 运行整条管线：校验标注、构建参考集、并行分类并导出
    ///
    /// 只要所有批次都处理完毕任务就算成功，
    /// 单张图片的分类结果（包括无匹配）不影响整体成败。
    pub fn run(&self, extractor: &dyn FeatureExtractor, cache: &EmbeddingCache) -> Result<()> {
        self.ensure_valid_labels(extractor)?;

        let refs = cache.load_or_rebuild(extractor)?;
        info!("参考集共 {} 条", refs.len());

        let paths = utils::image_paths(&self.raw_dir);
        let chunks: Vec<&[PathBuf]> = paths.chunks(self.batch_size.max(1)).collect();
        info!("待分类图片 {} 张，共 {} 个批次", paths.len(), chunks.len());

        // 留出两个核心给系统，最少保留一个工作线程
        let workers = num_cpus::get().saturating_sub(2).max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;

        let pb = ProgressBar::new(chunks.len() as u64).with_style(pb_style());
        pool.install(|| {
            chunks.par_iter().progress_with(pb.clone()).for_each(|chunk| {
                self.export_chunk(extractor, &refs, chunk);
            });
        });
        pb.finish_with_message("导出完成");
        Ok(())
    }

    /// Crash 策略下的自愈循环：每发现一个违规文件就把它挪进隔离目录，
    /// 然后从头重新校验。重试次数以初始文件数为上限，超过则报错退出，
    /// 避免同一错误反复出现时陷入死循环。
    fn ensure_valid_labels(&self, extractor: &dyn FeatureExtractor) -> Result<()> {
        if self.conflict != Conflict::Crash {
            validate_labels(extractor, &self.labeled_dir, self.conflict)?;
            return Ok(());
        }

        let quarantine = self
            .labeled_dir
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(QUARANTINE_DIR);
        let max_retries = utils::image_paths(&self.labeled_dir).len();

        for _ in 0..=max_retries {
            match validate_labels(extractor, &self.labeled_dir, Conflict::Crash) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // 不携带路径的错误无从隔离，直接向上传播
                    let Some(path) = e.path().map(Path::to_path_buf) else {
                        return Err(e.into());
                    };
                    let dest = quarantine_dest(&quarantine, &path)?;
                    warn!(
                        "标注图片无效: {}，移入 {} 后重新校验",
                        path.display(),
                        dest.display()
                    );
                    fs::rename(&path, &dest)
                        .with_context(|| format!("无法隔离文件: {}", path.display()))?;
                }
            }
        }
        bail!("标注校验重试次数超过上限，仍存在无效图片")
    }

    fn export_chunk(
        &self,
        extractor: &dyn FeatureExtractor,
        refs: &[ReferenceItem],
        chunk: &[PathBuf],
    ) {
        for path in chunk {
            // 单张图片的失败不允许影响同批次的其他图片
            if let Err(e) = self.export_one(extractor, refs, path) {
                warn!("处理失败: {} ({e})", path.display());
            }
        }
    }

    /// 对一张图片：检测所有人脸并逐一分类，
    /// 整张图片按最佳匹配（最近邻距离最小）的人脸归类。
    /// 没有人脸或最佳人脸不可信时不产生任何输出。
    fn export_one(
        &self,
        extractor: &dyn FeatureExtractor,
        refs: &[ReferenceItem],
        path: &Path,
    ) -> Result<()> {
        let faces = extractor.detect_and_embed(path)?;
        if faces.is_empty() {
            return Ok(());
        }

        let mut labeled: Vec<(FaceBox, Option<String>)> = Vec::with_capacity(faces.len());
        let mut best: Option<(usize, f32)> = None;
        for (i, det) in faces.iter().enumerate() {
            let hit = classify::nearest(&det.embedding, refs);
            if let Some((_, d)) = hit {
                if best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((i, d));
                }
            }
            let identity = hit
                .and_then(|(j, d)| (d <= self.threshold).then(|| refs[j].identity.clone()))
                .flatten();
            labeled.push((det.bbox, identity));
        }

        let Some((best_idx, _)) = best else {
            return Ok(());
        };
        let Some(class) = labeled[best_idx].1.clone() else {
            return Ok(());
        };

        // 同一类目录可能被多个 worker 同时创建，create_dir_all 重复调用是安全的
        let class_dir = self.output_dir.join(&class);
        fs::create_dir_all(&class_dir)?;
        let file_name =
            path.file_name().with_context(|| format!("无效的文件名: {}", path.display()))?;
        let dest = class_dir.join(file_name);

        if self.annotate {
            if let Err(e) = annotate::draw_detections(path, &labeled, &dest) {
                warn!("绘制人脸框失败，回退为原样拷贝: {} ({e})", path.display());
                fs::copy(path, &dest)?;
            }
        } else {
            fs::copy(path, &dest)?;
        }
        Ok(())
    }
}

/// 为被隔离的文件挑选目标路径，重名时追加随机后缀
fn quarantine_dest(quarantine: &Path, path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(quarantine)?;
    let name = path.file_name().with_context(|| format!("无效的文件名: {}", path.display()))?;
    let mut dest = quarantine.join(name);
    while dest.exists() {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        dest = quarantine.join(format!("{}_{:04x}{}", stem, rand::random::<u16>(), ext));
    }
    Ok(dest)
}
