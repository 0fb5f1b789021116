/// 跟踪系统 (Tracking System)
///
/// 将逐帧检测转化为连续轨迹与少量语音告警
/// - Store:    轨迹存储 (单一互斥锁共享)
/// - Motion:   运动分类 (接近 / 横向方向)
/// - Debounce: 告警去抖 (冷却与信号灯状态机)
/// - Summary:  路况播报
pub mod debounce;
pub mod motion;
pub mod store;
pub mod summary;

pub use debounce::{AlertDebouncer, AlertEvent, AlertKind, Observation, SignalState};
pub use motion::{Lateral, MotionClassifier, MotionResult};
pub use store::{SharedTrackStore, Track, TrackStore};
pub use summary::{SummaryGenerator, Zone, NO_OBJECTS};
