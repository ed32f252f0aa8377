//! 端到端管线测试：用文本桩提取器驱动完整的校验、缓存、分类、导出流程。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use facesort::cache::EmbeddingCache;
use facesort::error::FaceError;
use facesort::export::ExportJob;
use facesort::extract::{Detection, FaceBox, FeatureExtractor};
use facesort::validate::Conflict;
use rstest::rstest;

/// 把文本文件当成"图片"的桩提取器：每个非空行是一张人脸的嵌入向量，
/// 空文件没有人脸，解析失败视为损坏图片
struct TextExtractor;

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

struct Fixture {
    _tmp: tempfile::TempDir,
    raw_dir: PathBuf,
    labeled_dir: PathBuf,
    output_dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("raw");
        let labeled_dir = tmp.path().join("labeled");
        let output_dir = tmp.path().join("results");
        fs::create_dir_all(&raw_dir).unwrap();
        fs::create_dir_all(&labeled_dir).unwrap();
        Self { _tmp: tmp, raw_dir, labeled_dir, output_dir }
    }

    fn write(&self, dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn job(&self, conflict: Conflict) -> ExportJob {
        ExportJob {
            raw_dir: self.raw_dir.clone(),
            labeled_dir: self.labeled_dir.clone(),
            output_dir: self.output_dir.clone(),
            batch_size: 3,
            threshold: 1.0,
            conflict,
            annotate: false,
        }
    }

    fn cache(&self) -> EmbeddingCache {
        EmbeddingCache::new(&self.labeled_dir, None)
    }

    fn quarantine_dir(&self) -> PathBuf {
        self.labeled_dir.parent().unwrap().join("quarantine")
    }
}

fn count_files(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[test]
fn export_routes_matches_and_drops_the_rest() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");

    // 7 张落在阈值内，3 张离 alice 很远
    let mut matching = Vec::new();
    for i in 0..7 {
        matching.push(fx.write(&fx.raw_dir, &format!("m{i}.jpg"), "10 10.5\n"));
    }
    for i in 0..3 {
        fx.write(&fx.raw_dir, &format!("far{i}.jpg"), "99 -99\n");
    }

    fx.job(Conflict::Crash).run(&TextExtractor, &fx.cache())?;

    let alice_dir = fx.output_dir.join("alice");
    assert_eq!(count_files(&alice_dir), 7);
    // 未匹配的图片不产生任何输出
    let subdirs: Vec<_> = fs::read_dir(&fx.output_dir)?.collect();
    assert_eq!(subdirs.len(), 1);
    // annotate=false 时导出是逐字节拷贝
    for src in matching {
        let dest = alice_dir.join(src.file_name().unwrap());
        assert_eq!(fs::read(&src)?, fs::read(&dest)?);
    }
    Ok(())
}

#[test]
fn none_exemplar_absorbs_lookalikes() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    fx.write(&fx.labeled_dir, "none_1.jpg", "0 0\n");

    fx.write(&fx.raw_dir, "stranger.jpg", "0.2 0.1\n");
    fx.write(&fx.raw_dir, "her.jpg", "10 10.1\n");

    fx.job(Conflict::Crash).run(&TextExtractor, &fx.cache())?;

    // 离负例最近的图片被吸收，不会出现 none 子目录
    assert!(!fx.output_dir.join("none").exists());
    assert!(!fx.output_dir.join("alice").join("stranger.jpg").exists());
    assert!(fx.output_dir.join("alice").join("her.jpg").exists());
    Ok(())
}

#[test]
fn image_routed_by_best_matching_face() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    fx.write(&fx.labeled_dir, "bob_1.jpg", "-10 -10\n");

    // 两张人脸：离 bob 更近的那张决定整张图片的归属
    fx.write(&fx.raw_dir, "group.jpg", "10 10.8\n-10 -10.1\n");

    fx.job(Conflict::Crash).run(&TextExtractor, &fx.cache())?;

    assert!(fx.output_dir.join("bob").join("group.jpg").exists());
    assert!(!fx.output_dir.join("alice").join("group.jpg").exists());
    Ok(())
}

#[rstest]
#[case::one_corrupt(1)]
#[case::two_corrupt(2)]
fn crash_policy_quarantines_bad_labels(#[case] corrupt: usize) -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    for i in 0..corrupt {
        fx.write(&fx.labeled_dir, &format!("bad_{i}.jpg"), "not numbers");
    }
    fx.write(&fx.raw_dir, "m.jpg", "10 10\n");

    fx.job(Conflict::Crash).run(&TextExtractor, &fx.cache())?;

    // 每轮重试隔离一个违规文件，最终标注目录只剩干净数据
    assert_eq!(count_files(&fx.quarantine_dir()), corrupt);
    assert_eq!(count_files(&fx.labeled_dir), 1);
    assert!(fx.output_dir.join("alice").join("m.jpg").exists());
    Ok(())
}

#[test]
fn quarantine_renames_on_collision() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    fx.write(&fx.labeled_dir, "bad_1.jpg", "oops");
    // 隔离目录里已经躺着一个同名文件
    fs::create_dir_all(fx.quarantine_dir())?;
    fs::write(fx.quarantine_dir().join("bad_1.jpg"), "earlier run")?;

    fx.job(Conflict::Crash).run(&TextExtractor, &fx.cache())?;

    assert_eq!(count_files(&fx.quarantine_dir()), 2);
    Ok(())
}

#[test]
fn remove_policy_cleans_labels_without_quarantine() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    fx.write(&fx.labeled_dir, "bad_1.jpg", "oops");
    fx.write(&fx.raw_dir, "m.jpg", "10 10\n");

    fx.job(Conflict::Remove).run(&TextExtractor, &fx.cache())?;

    assert!(!fx.labeled_dir.join("bad_1.jpg").exists());
    assert!(!fx.quarantine_dir().exists());
    assert!(fx.output_dir.join("alice").join("m.jpg").exists());
    Ok(())
}

#[test]
fn corrupt_raw_image_does_not_abort_the_batch() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    // 同一批次里混入一张损坏图片和一张无人脸图片
    fx.write(&fx.raw_dir, "a.jpg", "10 10\n");
    fx.write(&fx.raw_dir, "broken.jpg", "???");
    fx.write(&fx.raw_dir, "empty.jpg", "");

    fx.job(Conflict::Crash).run(&TextExtractor, &fx.cache())?;

    assert!(fx.output_dir.join("alice").join("a.jpg").exists());
    assert_eq!(count_files(&fx.output_dir.join("alice")), 1);
    Ok(())
}

#[test]
fn cached_and_fresh_runs_agree() -> Result<()> {
    let fx = Fixture::new();
    fx.write(&fx.labeled_dir, "alice_1.jpg", "10 10\n");
    fx.write(&fx.raw_dir, "m.jpg", "10 10\n");

    let cache_path = fx.labeled_dir.parent().unwrap().join("embeddings_cache.bin");
    let cache = EmbeddingCache::new(&fx.labeled_dir, Some(cache_path.clone()));

    fx.job(Conflict::Crash).run(&TextExtractor, &cache)?;
    assert!(cache_path.exists());
    fs::remove_dir_all(&fx.output_dir)?;

    // 第二次运行命中缓存，结果不变
    fx.job(Conflict::Crash).run(&TextExtractor, &cache)?;
    assert!(fx.output_dir.join("alice").join("m.jpg").exists());
    Ok(())
}
