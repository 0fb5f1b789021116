//! 路况播报 (Summary Generator)
//!
//! 先清理过期轨迹, 再为每条剩余轨迹生成一句 "{类别} detected {区域} is {运动}."

use tracing::debug;

use super::motion::Lateral;
use super::store::{SharedTrackStore, Track};
use crate::config::TrackingConfig;

pub const NO_OBJECTS: &str = "No objects are currently detected.";

/// 画面横向三等分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub fn from_x(x: i32, width: u32) -> Self {
        let x = x as f32;
        let w = width as f32;
        if x < w / 3.0 {
            Zone::Left
        } else if x < 2.0 * w / 3.0 {
            Zone::Center
        } else {
            Zone::Right
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Zone::Left => "on the left",
            Zone::Center => "in the center",
            Zone::Right => "on the right",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryGenerator {
    store: SharedTrackStore,
    frame_width: u32,
    stale_after_secs: f64,
    dead_zone_px: i32,
}

impl SummaryGenerator {
    pub fn new(store: SharedTrackStore, frame_width: u32, config: &TrackingConfig) -> Self {
        Self {
            store,
            frame_width,
            stale_after_secs: config.stale_after_secs,
            dead_zone_px: config.dead_zone_px,
        }
    }

    /// 生成路况播报; 清理与读取在同一把锁内完成
    pub fn summarize(&self, now: f64) -> String {
        let mut store = self.store.lock();
        let evicted = store.evict_stale_before(now, self.stale_after_secs);
        if !evicted.is_empty() {
            debug!("播报前清理 {} 条过期轨迹", evicted.len());
        }

        let sentences: Vec<String> = store.all().map(|(_, t)| self.describe(t)).collect();
        if sentences.is_empty() {
            NO_OBJECTS.to_string()
        } else {
            sentences.join(" ")
        }
    }

    fn describe(&self, track: &Track) -> String {
        let zone = Zone::from_x(track.last_centroid.x, self.frame_width);
        let movement = Lateral::horizontal(track.drift(), self.dead_zone_px);
        format!(
            "{} detected {} is {}.",
            track.class_name,
            zone.describe(),
            movement.describe()
        )
    }
}
