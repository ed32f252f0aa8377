use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{CacheOptions, MatchOptions, ModelOptions, Opts};
use crate::export::ExportJob;
use crate::validate::Conflict;

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub matcher: MatchOptions,
    #[command(flatten)]
    pub cache: CacheOptions,
    /// 待分类的原始图片目录
    pub raw_dir: PathBuf,
    /// 标注图片目录
    pub labeled_dir: PathBuf,
    /// 结果输出目录，每个识别出的身份一个子目录
    pub output_dir: PathBuf,
    /// 无效标注的处理策略
    ///
    /// Crash 策略下导出命令会把违规文件移入隔离目录后自动重试
    #[arg(long, value_enum, default_value_t = Conflict::Crash)]
    pub conflict: Conflict,
    /// 在导出图片上绘制人脸框和身份标签
    #[arg(long)]
    pub annotate: bool,
}

impl SubCommandExtend for ExportCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let extractor = self.model.build_extractor()?;
        let cache = self.cache.build(&self.labeled_dir, self.matcher.batch_size);

        let job = ExportJob {
            raw_dir: self.raw_dir.clone(),
            labeled_dir: self.labeled_dir.clone(),
            output_dir: self.output_dir.clone(),
            batch_size: self.matcher.batch_size,
            threshold: self.matcher.threshold,
            conflict: self.conflict,
            annotate: self.annotate,
        };
        job.run(extractor.as_ref(), &cache)?;
        info!("结果已写入 {}", self.output_dir.display());
        Ok(())
    }
}
