//! 助手配置 - 通过JSON文件调整参数
//! Assistant configuration, persisted as pretty JSON

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::detection::ClassTaxonomy;
use crate::{Error, Result};

/// 帧率上限; 0 表示不节流
pub const MAX_FPS: f64 = 1000.0;
/// 非零帧率下限
pub const MIN_FPS: f64 = 0.1;
/// 后台清理间隔上限(秒)
pub const MAX_REAPER_INTERVAL_SECS: f64 = 3600.0;

fn valid_fps(fps: f64) -> bool {
    fps == 0.0 || (MIN_FPS..=MAX_FPS).contains(&fps)
}

/// 跟踪参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub stale_after_secs: f64,             // 轨迹过期时间(秒)
    pub dead_zone_px: i32,                 // 静止判定死区(像素)
    pub approach_cosine: f32,              // 接近方向余弦阈值
    pub min_area_divisor: f32,             // 最小面积 = 画面面积 / divisor
    pub reaper_interval_secs: Option<f64>, // 后台清理间隔, None = 仅在播报时清理
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 3.0,
            dead_zone_px: 5,
            approach_cosine: 0.9,
            min_area_divisor: 36.0,
            reaper_interval_secs: None,
        }
    }
}

/// 告警参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub approach_cooldown_secs: f64, // 接近告警冷却
    pub signal_reminder_secs: f64,   // 信号灯重复提醒间隔
    pub red_min_confidence: f32,     // 红灯最低置信度
    pub green_min_confidence: f32,   // 绿灯最低置信度
    pub dispatch_workers: usize,     // 语音派发线程数
    pub dispatch_queue: usize,       // 语音派发队列长度
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            approach_cooldown_secs: 3.0,
            signal_reminder_secs: 10.0,
            red_min_confidence: 0.6,
            green_min_confidence: 0.7,
            dispatch_workers: 2,
            dispatch_queue: 8,
        }
    }
}

/// 类别映射 (检测器标签 → 信号灯类别)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassConfig {
    pub red_signal_labels: Vec<String>,
    pub green_signal_labels: Vec<String>,
}

impl Default for ClassConfig {
    fn default() -> Self {
        Self {
            red_signal_labels: vec!["red-signal".into(), "red pedestrian light".into()],
            green_signal_labels: vec!["green-signal".into(), "green pedestrian light".into()],
        }
    }
}

/// 流水线参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub capture_fps: f64,
    pub stream_fps: f64,
    pub capture_backoff_ms: u64,
    pub jpeg_quality: u8,
    pub font_path: Option<PathBuf>, // 标签字体, None = 不绘制文字
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_fps: 30.0,
            stream_fps: 30.0,
            capture_backoff_ms: 50,
            jpeg_quality: 80,
            font_path: None,
        }
    }
}

/// 语音参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub approach_phrase: String,
    pub red_phrase: String,
    pub green_phrase: String,
    /// TTS程序及参数, 文本作为最后一个参数追加, 例如 ["espeak", "-s", "160"]
    pub tts_command: Option<Vec<String>>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            approach_phrase: "Caution! Object approaching.".into(),
            red_phrase: "Warning! Please wait, red light.".into(),
            green_phrase: "You may cross the street. Green light.".into(),
            tts_command: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub tracking: TrackingConfig,
    pub alerts: AlertConfig,
    pub classes: ClassConfig,
    pub pipeline: PipelineConfig,
    pub speech: SpeechConfig,
}

impl AssistConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写出默认配置; 解析失败时告警并使用默认值。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    /// 检查数值范围
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.alerts.red_min_confidence)
            || !unit.contains(&self.alerts.green_min_confidence)
        {
            return Err(Error::Config("signal confidence must be within [0, 1]".into()));
        }
        if !(-1.0..=1.0).contains(&self.tracking.approach_cosine) {
            return Err(Error::Config("approach_cosine must be within [-1, 1]".into()));
        }
        if self.tracking.stale_after_secs < 0.0
            || self.alerts.approach_cooldown_secs < 0.0
            || self.alerts.signal_reminder_secs < 0.0
        {
            return Err(Error::Config("durations must not be negative".into()));
        }
        if self.tracking.min_area_divisor <= 0.0 {
            return Err(Error::Config("min_area_divisor must be positive".into()));
        }
        if !valid_fps(self.pipeline.capture_fps) || !valid_fps(self.pipeline.stream_fps) {
            return Err(Error::Config(format!(
                "frame rates must be 0 or within [{}, {}]",
                MIN_FPS, MAX_FPS
            )));
        }
        if let Some(secs) = self.tracking.reaper_interval_secs {
            if !(secs > 0.0 && secs <= MAX_REAPER_INTERVAL_SECS) {
                return Err(Error::Config(format!(
                    "reaper_interval_secs must be within (0, {}]",
                    MAX_REAPER_INTERVAL_SECS
                )));
            }
        }
        Ok(())
    }

    pub fn taxonomy(&self) -> ClassTaxonomy {
        ClassTaxonomy::new(
            self.classes.red_signal_labels.iter().cloned(),
            self.classes.green_signal_labels.iter().cloned(),
        )
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前配置:");
        info!("  轨迹过期: {:.1}s", self.tracking.stale_after_secs);
        info!(
            "  接近告警冷却: {:.1}s | 信号灯提醒间隔: {:.1}s",
            self.alerts.approach_cooldown_secs, self.alerts.signal_reminder_secs
        );
        info!(
            "  红灯置信度: {:.2} | 绿灯置信度: {:.2}",
            self.alerts.red_min_confidence, self.alerts.green_min_confidence
        );
        info!(
            "  采集 {:.0}fps | 推流 {:.0}fps | JPEG质量 {}",
            self.pipeline.capture_fps, self.pipeline.stream_fps, self.pipeline.jpeg_quality
        );
        match &self.pipeline.font_path {
            Some(path) => info!("  标签字体: {}", path.display()),
            None => info!("  标签字体: 未配置 (不绘制类别标签)"),
        }
        match self.tracking.reaper_interval_secs {
            Some(secs) => info!("  后台清理: 每 {:.1}s", secs),
            None => info!("  后台清理: 关闭"),
        }
    }
}
