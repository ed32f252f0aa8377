use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::debug;

use crate::extract::FaceBox;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const FONT_SIZE: f32 = 20.0;

/// 按顺序探测常见的系统字体路径，优先选择覆盖 CJK 的字体
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
];

/// 找不到可用字体时只画框不写字，不算错误
static FONT: LazyLock<Option<FontVec>> = LazyLock::new(|| {
    for path in FONT_PATHS {
        if let Ok(data) = fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec_and_index(data, 0) {
                debug!("使用字体: {path}");
                return Some(font);
            }
        }
    }
    debug!("未找到可用字体，标注时只绘制人脸框");
    None
});

/// 在图片上绘制人脸框和身份标签，写入到目标路径
///
/// 身份为 `None` 的人脸标记为 "Unknown"。
/// 任何一步失败都只影响这一张图片，调用方负责回退为原样拷贝。
pub fn draw_detections(
    src: &Path,
    faces: &[(FaceBox, Option<String>)],
    dest: &Path,
) -> Result<()> {
    let mut img = image::open(src)
        .with_context(|| format!("无法解码图片: {}", src.display()))?
        .to_rgb8();

    for (bbox, identity) in faces {
        draw_face(&mut img, bbox, identity.as_deref().unwrap_or("Unknown"));
    }

    img.save(dest).with_context(|| format!("无法写入图片: {}", dest.display()))?;
    Ok(())
}

fn draw_face(img: &mut RgbImage, bbox: &FaceBox, name: &str) {
    let (iw, ih) = (img.width() as i32, img.height() as i32);
    let x1 = (bbox.x1 as i32).clamp(0, iw - 1);
    let y1 = (bbox.y1 as i32).clamp(0, ih - 1);
    let x2 = (bbox.x2 as i32).clamp(x1 + 1, iw);
    let y2 = (bbox.y2 as i32).clamp(y1 + 1, ih);

    let rect = Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32);
    draw_hollow_rect_mut(img, rect, BOX_COLOR);

    let Some(font) = FONT.as_ref() else {
        return;
    };
    let scale = PxScale::from(FONT_SIZE);
    let (tw, th) = text_size(scale, font, name);

    // 标签画在人脸框上方，越过图片顶部时往下挪
    let tx = x1;
    let ty = (y1 - th as i32 - 10).max(5);
    let bg = Rect::at(tx, ty).of_size(tw + 10, th + 10);
    draw_filled_rect_mut(img, bg, BOX_COLOR);
    draw_text_mut(img, TEXT_COLOR, tx + 5, ty + 5, scale, font, name);
}
