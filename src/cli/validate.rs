use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts};
use crate::validate::{Conflict, validate_labels};

#[derive(Parser, Debug, Clone)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 标注图片所在目录，文件名约定为 `<name>_<index>.<ext>`
    pub labeled_dir: PathBuf,
    /// 发现无效标注时的处理策略
    #[arg(long, value_enum, default_value_t = Conflict::Warn)]
    pub conflict: Conflict,
}

impl SubCommandExtend for ValidateCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let extractor = self.model.build_extractor()?;
        validate_labels(extractor.as_ref(), &self.labeled_dir, self.conflict)?;
        info!("标注校验完成");
        Ok(())
    }
}
