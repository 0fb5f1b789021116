//! 轨迹存储 (Track Store)
//!
//! 跟踪ID → 跟踪状态 的唯一权威映射。纯数据, 无I/O。
//! 跨线程共享时通过 [`SharedTrackStore`] 的单一互斥锁串行化。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::debounce::SignalState;
use crate::detection::{BBox, Detection, Point, Vector};
use crate::{Error, Result};

/// 跟踪对象 (一个物理目标跨帧的记录)
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// 外部检测器分配的跟踪ID
    pub id: u32,

    /// 基线检测框 (仅在中心点移出旧框时更新)
    pub bbox: BBox,

    /// 基线中心点
    pub prev_centroid: Point,

    /// 基线面积 (>= 1)
    pub prev_area: i64,

    /// 最近一次观测到的类别标签
    pub class_name: String,

    /// 信号灯状态 (非信号灯目标始终为 Unknown)
    pub signal: SignalState,

    /// 最近一次观测到的中心点
    pub last_centroid: Point,

    /// 最近一次告警时间, None = 从未告警
    pub last_alert_time: Option<f64>,

    /// 最近一次被检测到的时间
    pub last_seen_time: f64,
}

impl Track {
    fn from_detection(detection: &Detection, now: f64) -> Self {
        Self {
            id: detection.track_id,
            bbox: detection.bbox,
            prev_centroid: detection.bbox.centroid(),
            prev_area: detection.bbox.area(),
            class_name: detection.class_name.clone(),
            signal: SignalState::Unknown,
            last_centroid: detection.bbox.centroid(),
            last_alert_time: None,
            last_seen_time: now,
        }
    }

    /// 距上次告警的秒数, 从未告警视为无穷大
    pub fn secs_since_alert(&self, now: f64) -> f64 {
        match self.last_alert_time {
            Some(t) => now - t,
            None => f64::INFINITY,
        }
    }

    /// 最近观测位置相对基线的偏移; 目标停下后基线不变, 偏移不再增长
    pub fn drift(&self) -> Vector {
        self.last_centroid - self.prev_centroid
    }

    pub fn is_stale(&self, now: f64, threshold_secs: f64) -> bool {
        now - self.last_seen_time > threshold_secs
    }
}

#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: BTreeMap<u32, Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取或创建轨迹, 返回 (快照, 是否新建)
    ///
    /// 新轨迹的基线取自本次检测, 且从未告警。
    pub fn get_or_create(&mut self, detection: &Detection, now: f64) -> (Track, bool) {
        if let Some(track) = self.tracks.get(&detection.track_id) {
            return (track.clone(), false);
        }
        let track = Track::from_detection(detection, now);
        debug!("➕ 新轨迹 #{} ({})", track.id, track.class_name);
        self.tracks.insert(track.id, track.clone());
        (track, true)
    }

    /// 提交新的基线 (中心点、面积、检测框)
    pub fn update_baseline(&mut self, id: u32, centroid: Point, area: i64, bbox: BBox) -> Result<()> {
        let track = self.get_mut(id)?;
        track.prev_centroid = centroid;
        track.last_centroid = centroid;
        track.prev_area = area.max(1);
        track.bbox = bbox;
        Ok(())
    }

    /// 记录本帧观测到的中心点 (不改变基线)
    pub fn record_centroid(&mut self, id: u32, centroid: Point) -> Result<()> {
        self.get_mut(id)?.last_centroid = centroid;
        Ok(())
    }

    pub fn touch(&mut self, id: u32, now: f64) -> Result<()> {
        self.get_mut(id)?.last_seen_time = now;
        Ok(())
    }

    pub fn stamp_alert(&mut self, id: u32, now: f64) -> Result<()> {
        self.get_mut(id)?.last_alert_time = Some(now);
        Ok(())
    }

    /// 记录观测到的类别; 信号灯目标同时记录信号状态
    pub fn record_class(&mut self, id: u32, class_name: &str, signal: Option<SignalState>) -> Result<()> {
        let track = self.get_mut(id)?;
        if track.class_name != class_name {
            track.class_name = class_name.to_owned();
        }
        if let Some(signal) = signal {
            track.signal = signal;
        }
        Ok(())
    }

    /// 删除 `now - last_seen > threshold` 的轨迹, 返回被删除的ID (升序)
    pub fn evict_stale_before(&mut self, now: f64, threshold_secs: f64) -> Vec<u32> {
        let stale: Vec<u32> = self
            .tracks
            .values()
            .filter(|t| t.is_stale(now, threshold_secs))
            .map(|t| t.id)
            .collect();
        for id in &stale {
            self.tracks.remove(id);
        }
        if !stale.is_empty() {
            debug!("🧹 清理过期轨迹: {:?}", stale);
        }
        stale
    }

    pub fn get(&self, id: u32) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// 所有轨迹, 按ID升序
    pub fn all(&self) -> impl Iterator<Item = (u32, &Track)> {
        self.tracks.iter().map(|(id, t)| (*id, t))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Track> {
        self.tracks.get_mut(&id).ok_or(Error::UnknownTrack(id))
    }
}

/// 跨线程共享的轨迹存储 (单一互斥锁)
#[derive(Debug, Clone, Default)]
pub struct SharedTrackStore {
    inner: Arc<Mutex<TrackStore>>,
}

impl SharedTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加锁; 持锁线程panic后仍可继续使用
    pub fn lock(&self) -> MutexGuard<'_, TrackStore> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
