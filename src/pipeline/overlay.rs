//! 画面叠加层 (Overlay)
//!
//! 参考线、运动箭头、检测框与标签, 直接绘制在RGB帧上

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::detection::{BBox, FrameGeometry, Point};

pub const REFERENCE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const APPROACH_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const UPDATE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

const REFERENCE_THICKNESS: i32 = 2;
const ARROW_THICKNESS: i32 = 4;
const BOX_THICKNESS: i32 = 3;
const ARROW_TIP_RATIO: f32 = 0.1;
const LABEL_SCALE: f32 = 20.0;

pub struct Overlay {
    font: Option<FontVec>,
    label_scale: PxScale,
}

impl Overlay {
    /// 加载标签字体; 未配置或加载失败时只画图形不画文字
    pub fn new(font_path: Option<&Path>) -> Self {
        if font_path.is_none() {
            warn!("⚠️  未配置标签字体 (pipeline.font_path), 检测框不绘制类别标签");
        }
        let font = font_path.and_then(|path| {
            let loaded = std::fs::read(path)
                .map_err(|e| e.to_string())
                .and_then(|data| FontVec::try_from_vec(data).map_err(|e| e.to_string()));
            match loaded {
                Ok(font) => {
                    info!("✅ 标签字体加载成功: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️  标签字体加载失败 {}: {}, 不绘制标签", path.display(), e);
                    None
                }
            }
        });

        Self {
            font,
            label_scale: PxScale::from(LABEL_SCALE),
        }
    }

    pub fn without_labels() -> Self {
        Self {
            font: None,
            label_scale: PxScale::from(LABEL_SCALE),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 画面中心 → 底部中心 的参考线
    pub fn reference_line(&self, img: &mut RgbImage, geometry: &FrameGeometry) {
        thick_line(
            img,
            geometry.center,
            geometry.bottom_center,
            REFERENCE_THICKNESS,
            REFERENCE_COLOR,
        );
    }

    /// 旧中心点 → 新中心点 的箭头; 触发接近告警时使用告警颜色
    pub fn motion_arrow(&self, img: &mut RgbImage, from: Point, to: Point, alerted: bool) {
        let color = if alerted { APPROACH_COLOR } else { UPDATE_COLOR };
        thick_line(img, from, to, ARROW_THICKNESS, color);

        let (fx, fy) = from.as_f32();
        let (tx, ty) = to.as_f32();
        let (dx, dy) = (tx - fx, ty - fy);
        let len = (dx * dx + dy * dy).sqrt();
        if len < 1.0 {
            return;
        }

        let tip = (len * ARROW_TIP_RATIO).max(6.0);
        let back = dy.atan2(dx) + std::f32::consts::PI;
        for side in [-std::f32::consts::FRAC_PI_4, std::f32::consts::FRAC_PI_4] {
            let angle = back + side;
            let end = Point::new(
                (tx + tip * angle.cos()).round() as i32,
                (ty + tip * angle.sin()).round() as i32,
            );
            thick_line(img, to, end, ARROW_THICKNESS, color);
        }
    }

    pub fn bbox(&self, img: &mut RgbImage, bbox: &BBox) {
        for k in 0..BOX_THICKNESS {
            let rect = Rect::at(bbox.x1 - k, bbox.y1 - k)
                .of_size((bbox.width() + 2 * k).max(1) as u32, (bbox.height() + 2 * k).max(1) as u32);
            draw_hollow_rect_mut(img, rect, BOX_COLOR);
        }
    }

    /// 检测框左上角上方的标签
    pub fn label(&self, img: &mut RgbImage, bbox: &BBox, text: &str) {
        if let Some(font) = &self.font {
            let y = bbox.y1 - 10 - self.label_scale.y as i32;
            draw_text_mut(img, BOX_COLOR, bbox.x1, y.max(0), self.label_scale, font, text);
        }
    }
}

/// 通过平移多条平行线段模拟线宽
fn thick_line(img: &mut RgbImage, from: Point, to: Point, thickness: i32, color: Rgb<u8>) {
    let (fx, fy) = from.as_f32();
    let (tx, ty) = to.as_f32();
    let (dx, dy) = (tx - fx, ty - fy);
    let len = (dx * dx + dy * dy).sqrt().max(1.0);
    let (nx, ny) = (-dy / len, dx / len);

    let half = thickness / 2;
    for offset in -half..=(thickness - 1 - half) {
        let o = offset as f32;
        draw_line_segment_mut(
            img,
            (fx + nx * o, fy + ny * o),
            (tx + nx * o, ty + ny * o),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_line_is_drawn_down_the_middle() {
        let geometry = FrameGeometry::new(64, 48, 36.0);
        let mut img = RgbImage::new(64, 48);
        Overlay::without_labels().reference_line(&mut img, &geometry);

        assert_eq!(*img.get_pixel(32, 24), REFERENCE_COLOR);
        assert_eq!(*img.get_pixel(32, 40), REFERENCE_COLOR);
        assert_eq!(*img.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_arrow_color_reflects_alert() {
        let overlay = Overlay::without_labels();
        let mut img = RgbImage::new(100, 100);
        overlay.motion_arrow(&mut img, Point::new(10, 50), Point::new(80, 50), true);
        assert_eq!(*img.get_pixel(40, 50), APPROACH_COLOR);

        let mut img = RgbImage::new(100, 100);
        overlay.motion_arrow(&mut img, Point::new(10, 50), Point::new(80, 50), false);
        assert_eq!(*img.get_pixel(40, 50), UPDATE_COLOR);
    }

    #[test]
    fn test_bbox_near_edge_does_not_panic() {
        let overlay = Overlay::without_labels();
        let mut img = RgbImage::new(50, 50);
        overlay.bbox(&mut img, &BBox::new(0, 0, 60, 60));
        overlay.bbox(&mut img, &BBox::new(10, 10, 10, 10));
        assert_eq!(*img.get_pixel(10, 0), BOX_COLOR);
        overlay.label(&mut img, &BBox::new(0, 0, 5, 5), "person 0.90");
    }

    #[test]
    fn test_missing_font_disables_labels() {
        let overlay = Overlay::new(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!overlay.has_font());
    }

    #[test]
    fn test_default_config_draws_boxes_without_labels() {
        let config = crate::config::AssistConfig::default();
        let overlay = Overlay::new(config.pipeline.font_path.as_deref());
        assert!(!overlay.has_font());

        let mut img = RgbImage::new(80, 80);
        overlay.label(&mut img, &BBox::new(10, 40, 30, 60), "person 0.90");
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
