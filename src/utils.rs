use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;
use walkdir::WalkDir;

/// 扫描时识别的图片后缀
pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// 枚举目录下的所有图片文件
///
/// 结果按路径排序，保证参考集顺序稳定（最近邻并列时按先后顺序取第一个）。
pub fn image_paths(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
                == Some(true)
        })
        .collect();
    paths.sort();
    paths
}

/// 枚举目录下的所有普通文件，用于缓存新鲜度检查
pub fn regular_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")
        .expect("failed to build progress style")
}
