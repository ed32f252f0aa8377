use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Result, bail};
use indicatif::{ProgressBar, ProgressIterator};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::extract::{Embedding, FeatureExtractor};
use crate::label::ReferenceItem;
use crate::utils::{self, pb_style};

/// 缓存格式版本，不匹配的记录按过期处理
const CACHE_VERSION: u32 = 1;

/// 持久化的缓存记录
///
/// 路径相对于标注目录存储，加载时重新锚定到当前目录，
/// 因此缓存文件本身可以跟随数据目录整体搬迁。
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    version: u32,
    relative_paths: Vec<String>,
    embeddings: Vec<Embedding>,
}

/// 标注图片的嵌入缓存
///
/// 嵌入计算是整个管线的主要开销，参考集没有变化时，
/// 重复运行只需要一次反序列化而不是逐张推理。
/// 新鲜度以缓存文件自身的修改时间为准：只要标注目录下任何
/// 普通文件的修改时间不早于缓存文件，缓存即视为过期并整体重建。
pub struct EmbeddingCache {
    labeled_dir: PathBuf,
    cache_path: Option<PathBuf>,
    batch_size: usize,
    use_cache: bool,
}

impl EmbeddingCache {
    pub fn new(labeled_dir: impl Into<PathBuf>, cache_path: Option<PathBuf>) -> Self {
        Self { labeled_dir: labeled_dir.into(), cache_path, batch_size: 32, use_cache: true }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// 加载缓存，过期或不可读时重新计算并尝试回写
    ///
    /// 缓存的读写失败都不会向上传播：读失败回退到重建，
    /// 写失败记录日志后忽略，分类任务照常进行。
    pub fn load_or_rebuild(
        &self,
        extractor: &dyn FeatureExtractor,
    ) -> Result<Vec<ReferenceItem>> {
        let Some(cache_path) = self.cache_path.as_ref().filter(|_| self.use_cache) else {
            return self.rebuild(extractor);
        };

        if self.is_fresh(cache_path) {
            match self.load(cache_path) {
                Ok(items) => {
                    info!("从缓存加载 {} 条参考数据: {}", items.len(), cache_path.display());
                    return Ok(items);
                }
                Err(e) => warn!("缓存读取失败，重新计算: {e}"),
            }
        }

        let items = self.rebuild(extractor)?;
        if let Err(e) = self.persist(cache_path, &items) {
            warn!("缓存写入失败（忽略）: {e}");
        }
        Ok(items)
    }

    /// 缓存有效当且仅当缓存文件存在，且其修改时间严格晚于
    /// 标注目录下每一个普通文件的修改时间；空目录永远视为过期
    fn is_fresh(&self, cache_path: &Path) -> bool {
        let Some(cache_mtime) = mtime(cache_path) else {
            return false;
        };
        let files = utils::regular_files(&self.labeled_dir);
        if files.is_empty() {
            return false;
        }
        files.iter().all(|f| match mtime(f) {
            Some(t) => t < cache_mtime,
            None => false,
        })
    }

    fn load(&self, cache_path: &Path) -> Result<Vec<ReferenceItem>> {
        let data = fs::read(cache_path)?;
        let record: CacheRecord = bincode::deserialize(&data)?;
        if record.version != CACHE_VERSION {
            bail!("缓存版本不匹配: {} != {}", record.version, CACHE_VERSION);
        }
        if record.relative_paths.len() != record.embeddings.len() {
            bail!("缓存内容损坏: 路径和向量数量不一致");
        }
        let items = record
            .relative_paths
            .into_iter()
            .zip(record.embeddings)
            .map(|(rel, embedding)| ReferenceItem::new(self.labeled_dir.join(rel), embedding))
            .collect();
        Ok(items)
    }

    fn rebuild(&self, extractor: &dyn FeatureExtractor) -> Result<Vec<ReferenceItem>> {
        let files = utils::image_paths(&self.labeled_dir);
        info!("重新计算 {} 张标注图片的嵌入向量", files.len());

        let pb = ProgressBar::new(files.len() as u64).with_style(pb_style());
        let mut items = Vec::with_capacity(files.len());
        for chunk in files.chunks(self.batch_size) {
            for path in chunk.iter().progress_with(pb.clone()) {
                let embedding = extractor.embed_single_expected(path)?;
                items.push(ReferenceItem::new(path.clone(), embedding));
            }
        }
        pb.finish_and_clear();
        Ok(items)
    }

    fn persist(&self, cache_path: &Path, items: &[ReferenceItem]) -> Result<()> {
        let mut relative_paths = Vec::with_capacity(items.len());
        for item in items {
            let rel = item.path.strip_prefix(&self.labeled_dir)?;
            relative_paths.push(rel.to_string_lossy().into_owned());
        }
        let record = CacheRecord {
            version: CACHE_VERSION,
            relative_paths,
            embeddings: items.iter().map(|i| i.embedding.clone()).collect(),
        };

        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(cache_path, bincode::serialize(&record)?)?;
        debug!("缓存已写入: {}", cache_path.display());
        Ok(())
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
