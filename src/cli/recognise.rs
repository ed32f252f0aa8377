use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::classify;
use crate::cli::SubCommandExtend;
use crate::config::{CacheOptions, MatchOptions, ModelOptions, Opts};
use crate::extract::Embedding;

#[derive(Parser, Debug, Clone)]
pub struct RecogniseCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub matcher: MatchOptions,
    #[command(flatten)]
    pub cache: CacheOptions,
    /// 待识别的图片路径
    pub image: PathBuf,
    /// 标注图片目录
    pub labeled_dir: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for RecogniseCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let extractor = self.model.build_extractor()?;
        let refs = self
            .cache
            .build(&self.labeled_dir, self.matcher.batch_size)
            .load_or_rebuild(extractor.as_ref())?;

        let faces = extractor.detect_and_embed(&self.image)?;
        let embeddings: Vec<Embedding> = faces.into_iter().map(|f| f.embedding).collect();

        // 同一个人出现多次只报告一次
        let identities: BTreeSet<String> = classify::classify(&embeddings, &refs, self.matcher.threshold)
            .into_iter()
            .flatten()
            .collect();

        match self.output_format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&identities)?)
            }
            OutputFormat::Table => {
                for identity in &identities {
                    println!("{identity}");
                }
            }
        }
        Ok(())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
