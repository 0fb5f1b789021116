//! 检测数据结构定义
//! Data structures shared by the detector boundary and the tracking core

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Sub;

// ========== 几何 ==========

/// 像素坐标点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn as_f32(&self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, rhs: Point) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// 位移向量 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector {
    pub dx: i32,
    pub dy: i32,
}

impl Vector {
    pub const ZERO: Vector = Vector { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub fn norm(&self) -> f32 {
        let (dx, dy) = (self.dx as f32, self.dy as f32);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn dot(&self, other: &Vector) -> f32 {
        self.dx as f32 * other.dx as f32 + self.dy as f32 * other.dy as f32
    }

    /// 余弦相似度, 任一向量长度为0时无定义
    pub fn cosine(&self, other: &Vector) -> Option<f32> {
        let norms = self.norm() * other.norm();
        if norms > 0.0 {
            Some(self.dot(other) / norms)
        } else {
            None
        }
    }
}

/// 检测框 (x1,y1)-(x2,y2), 保证 x1<=x2, y1<=y2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    /// 创建检测框, 颠倒的坐标会被交换
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// 中心点 (整数除法)
    pub fn centroid(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// 面积, 退化框截断为1
    pub fn area(&self) -> i64 {
        (self.width() as i64 * self.height() as i64).max(1)
    }

    /// 点是否落在框内 (含边界)
    pub fn contains(&self, p: Point) -> bool {
        self.x1 <= p.x && p.x <= self.x2 && self.y1 <= p.y && p.y <= self.y2
    }
}

impl From<[f32; 4]> for BBox {
    fn from(b: [f32; 4]) -> Self {
        BBox::new(b[0] as i32, b[1] as i32, b[2] as i32, b[3] as i32)
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1 as f32, b.y1 as f32, b.x2 as f32, b.y2 as f32]
    }
}

/// 外部检测器输出的一条检测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "id")]
    pub track_id: u32,
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(rename = "conf")]
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BBox,
}

impl Detection {
    pub fn new(track_id: u32, class_name: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            track_id,
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

// ========== 类别 ==========

/// 行人信号灯颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalColor {
    Red,
    Green,
}

/// 检测类别的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassCategory {
    Object,
    Signal(SignalColor),
}

impl ClassCategory {
    pub fn is_signal(&self) -> bool {
        matches!(self, ClassCategory::Signal(_))
    }
}

/// 检测器标签 → 类别 的映射表
#[derive(Debug, Clone)]
pub struct ClassTaxonomy {
    red: HashSet<String>,
    green: HashSet<String>,
}

impl ClassTaxonomy {
    pub fn new(
        red: impl IntoIterator<Item = String>,
        green: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            red: red.into_iter().map(|s| s.to_lowercase()).collect(),
            green: green.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    pub fn categorize(&self, label: &str) -> ClassCategory {
        let label = label.trim().to_lowercase();
        if self.red.contains(&label) {
            ClassCategory::Signal(SignalColor::Red)
        } else if self.green.contains(&label) {
            ClassCategory::Signal(SignalColor::Green)
        } else {
            ClassCategory::Object
        }
    }
}

impl Default for ClassTaxonomy {
    fn default() -> Self {
        Self::new(
            ["red-signal".to_string(), "red pedestrian light".to_string()],
            ["green-signal".to_string(), "green pedestrian light".to_string()],
        )
    }
}

// ========== 画面几何 ==========

/// 画面几何常量, 启动时由摄像头探测一次得到, 会话期间不变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub center: Point,
    pub bottom_center: Point,
    /// 画面中心 → 底部中心, 即"朝向用户"的方向
    pub reference: Vector,
    /// 小于该面积的目标视为远处噪声
    pub min_area: f32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, min_area_divisor: f32) -> Self {
        let center = Point::new(width as i32 / 2, height as i32 / 2);
        let bottom_center = Point::new(width as i32 / 2, height as i32);
        Self {
            width,
            height,
            center,
            bottom_center,
            reference: bottom_center - center,
            min_area: (width as f32 * height as f32) / min_area_divisor,
        }
    }
}
