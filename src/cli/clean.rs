use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct CleanCommand {
    /// 结果输出目录
    pub output_dir: PathBuf,
    /// 嵌入缓存文件路径，配合 --cache 或 --all 使用
    #[arg(long, value_name = "FILE")]
    pub cache_path: Option<PathBuf>,
    /// 只删除嵌入缓存
    #[arg(long)]
    pub cache: bool,
    /// 同时删除导出结果和嵌入缓存
    #[arg(long)]
    pub all: bool,
}

impl SubCommandExtend for CleanCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let clean_results = !self.cache || self.all;
        let clean_cache = self.cache || self.all;

        if clean_results {
            if self.output_dir.exists() {
                info!("删除结果目录: {}", self.output_dir.display());
                fs::remove_dir_all(&self.output_dir)?;
            } else {
                info!("结果目录不存在: {}", self.output_dir.display());
            }
        }

        if clean_cache {
            match &self.cache_path {
                Some(path) if path.exists() => {
                    info!("删除嵌入缓存: {}", path.display());
                    fs::remove_file(path)?;
                }
                Some(path) => info!("嵌入缓存不存在: {}", path.display()),
                None => info!("未指定缓存路径，跳过缓存清理"),
            }
        }
        Ok(())
    }
}
