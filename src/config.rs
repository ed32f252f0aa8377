use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cache::EmbeddingCache;
use crate::cli::*;
use crate::extract::FeatureExtractor;

/// 默认的嵌入缓存文件名，放在标注目录的同级位置
const DEFAULT_CACHE_NAME: &str = "embeddings_cache.bin";

#[derive(Parser, Debug, Clone)]
#[command(name = "facesort", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 校验标注目录中的每张图片都恰好包含一张人脸
    Validate(ValidateCommand),
    /// 按标注身份批量分类原始图片并导出到对应子目录
    Export(ExportCommand),
    /// 识别单张图片中出现的所有已标注身份
    Recognise(RecogniseCommand),
    /// 把图片中检测到的人脸作为负例加入标注目录
    AddNone(AddNoneCommand),
    /// 清理导出结果和嵌入缓存
    Clean(CleanCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// 人脸检测模型路径（UltraFace 320 风格的 ONNX 模型）
    #[arg(long, value_name = "FILE")]
    pub detector: PathBuf,
    /// 人脸嵌入模型路径（112x112 输入的 ONNX 模型）
    #[arg(long, value_name = "FILE")]
    pub recognizer: PathBuf,
    /// 人脸检测置信度阈值
    #[arg(long, value_name = "SCORE", default_value_t = 0.7)]
    pub det_confidence: f32,
}

impl ModelOptions {
    /// 根据命令行参数加载特征提取器
    #[cfg(feature = "onnx")]
    pub fn build_extractor(&self) -> anyhow::Result<Box<dyn FeatureExtractor>> {
        let extractor = crate::extract::OnnxExtractor::load(
            &self.detector,
            &self.recognizer,
            self.det_confidence,
        )?;
        Ok(Box::new(extractor))
    }

    #[cfg(not(feature = "onnx"))]
    pub fn build_extractor(&self) -> anyhow::Result<Box<dyn FeatureExtractor>> {
        anyhow::bail!("编译时未启用 onnx 特性，无法加载模型")
    }
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 判定为同一身份的最大嵌入距离，超过则视为无匹配
    #[arg(short, long, value_name = "DIST", default_value_t = 1.0)]
    pub threshold: f32,
    /// 每个批次处理的图片数量
    #[arg(short, long, value_name = "SIZE", default_value_t = 32)]
    pub batch_size: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct CacheOptions {
    /// 嵌入缓存文件路径，默认为标注目录同级的 embeddings_cache.bin
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,
    /// 不读取也不写入嵌入缓存，每次都重新计算
    #[arg(long)]
    pub no_cache: bool,
}

impl CacheOptions {
    /// 解析实际使用的缓存路径
    pub fn cache_path(&self, labeled_dir: &Path) -> Option<PathBuf> {
        self.cache
            .clone()
            .or_else(|| Some(labeled_dir.parent()?.join(DEFAULT_CACHE_NAME)))
    }

    pub fn build(&self, labeled_dir: &Path, batch_size: usize) -> EmbeddingCache {
        EmbeddingCache::new(labeled_dir, self.cache_path(labeled_dir))
            .batch_size(batch_size)
            .use_cache(!self.no_cache)
    }
}
