//! 运动分类 (Motion Classifier)
//!
//! 根据基线与当前的中心点/面积判断目标是否在接近用户, 以及横向移动方向。
//! 纯函数, 不修改任何轨迹状态。

use crate::detection::{FrameGeometry, Point, Vector};

/// 横向移动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lateral {
    Left,
    Right,
    Stationary,
}

impl Lateral {
    /// 死区规则: |dx| 与 |dy| 都小于死区时视为静止, 否则按 dx 符号判断
    pub fn from_vector(v: Vector, dead_zone_px: i32) -> Self {
        if v.dx.abs() < dead_zone_px && v.dy.abs() < dead_zone_px {
            Lateral::Stationary
        } else if v.dx > 0 {
            Lateral::Right
        } else {
            Lateral::Left
        }
    }

    /// 播报用: 只描述横向移动, 纯纵向移动 (dx == 0) 视为静止
    pub fn horizontal(v: Vector, dead_zone_px: i32) -> Self {
        match Self::from_vector(v, dead_zone_px) {
            Lateral::Left if v.dx == 0 => Lateral::Stationary,
            lateral => lateral,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Lateral::Left => "moving left",
            Lateral::Right => "moving right",
            Lateral::Stationary => "stationary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionResult {
    pub vector: Vector,
    pub is_approaching: bool,
    pub lateral: Lateral,
}

/// 分类阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionClassifier {
    pub reference: Vector,
    pub min_area: f32,
    pub min_cosine: f32,
    pub dead_zone_px: i32,
}

impl MotionClassifier {
    pub fn new(geometry: &FrameGeometry, min_cosine: f32, dead_zone_px: i32) -> Self {
        Self {
            reference: geometry.reference,
            min_area: geometry.min_area,
            min_cosine,
            dead_zone_px,
        }
    }

    pub fn classify(
        &self,
        prev_centroid: Point,
        prev_area: i64,
        new_centroid: Point,
        new_area: i64,
    ) -> MotionResult {
        let vector = new_centroid - prev_centroid;

        // 面积变大(更近) + 足够大(非远处噪声) + 朝向用户
        let is_approaching = new_area > prev_area
            && new_area as f32 > self.min_area
            && vector
                .cosine(&self.reference)
                .is_some_and(|c| c > self.min_cosine);

        MotionResult {
            vector,
            is_approaching,
            lateral: Lateral::from_vector(vector, self.dead_zone_px),
        }
    }
}
