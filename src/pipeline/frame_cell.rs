//! 最新帧槽位 (Latest Frame Cell)
//!
//! 单槽邮箱: 生产者覆盖写入, 读者取快照。从不排队, 读者只看到最新帧或空。

use std::sync::{Arc, Mutex};

use image::RgbImage;

/// 已发布的帧, 发布后不可变
#[derive(Debug, Clone)]
pub struct PublishedFrame {
    /// 发布序号, 从1开始递增
    pub seq: u64,
    /// 发布时刻 (会话秒)
    pub timestamp: f64,
    pub image: Arc<RgbImage>,
}

#[derive(Debug, Default)]
struct Slot {
    seq: u64,
    frame: Option<PublishedFrame>,
}

#[derive(Debug, Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Slot>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布新帧并覆盖旧帧, 返回序号
    pub fn publish(&self, image: RgbImage, timestamp: f64) -> u64 {
        let image = Arc::new(image);
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.seq += 1;
        let seq = slot.seq;
        slot.frame = Some(PublishedFrame {
            seq,
            timestamp,
            image,
        });
        seq
    }

    /// 最新帧快照 (只克隆Arc, 不持锁编码)
    pub fn snapshot(&self) -> Option<PublishedFrame> {
        self.slot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .frame
            .clone()
    }

    /// 仅当有比 `seen` 更新的帧时返回
    pub fn newer_than(&self, seen: u64) -> Option<PublishedFrame> {
        self.snapshot().filter(|f| f.seq > seen)
    }
}
