use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts};
use crate::label::NONE_LABEL;
use crate::utils;

/// 把一张图片里检测到的所有人脸裁剪下来，作为负例加入标注目录
///
/// 负例参与最近邻竞争但永远不会作为身份输出，
/// 适合吸收经常被误认的路人脸。
#[derive(Parser, Debug, Clone)]
pub struct AddNoneCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 包含待吸收人脸的图片
    pub image: PathBuf,
    /// 标注图片目录
    pub labeled_dir: PathBuf,
}

impl SubCommandExtend for AddNoneCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let extractor = self.model.build_extractor()?;
        let faces = extractor.detect_and_embed(&self.image)?;
        if faces.is_empty() {
            info!("图片中没有检测到人脸: {}", self.image.display());
            return Ok(());
        }

        let img = image::open(&self.image)
            .with_context(|| format!("无法解码图片: {}", self.image.display()))?
            .to_rgb8();

        // 序号接在已有负例之后
        let prefix = format!("{NONE_LABEL}_");
        let existing = utils::image_paths(&self.labeled_dir)
            .iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .count();

        for (i, det) in faces.iter().enumerate() {
            let dest = self.labeled_dir.join(format!("{NONE_LABEL}_{}.png", existing + i + 1));
            det.bbox.crop(&img).save(&dest)?;
            info!("已保存负例: {}", dest.display());
        }
        Ok(())
    }
}
