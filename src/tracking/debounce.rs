//! 告警去抖 (Alert Debouncer)
//!
//! 两套独立策略:
//! - 接近告警: 判定为接近且距上次告警超过冷却时间才触发
//! - 信号灯:   Red/Green/Unknown 状态机, 状态变化立即告警, 状态不变时定期重复提醒

use super::motion::MotionResult;
use super::store::Track;
use crate::config::AlertConfig;
use crate::detection::SignalColor;

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    ApproachAlert,
    SignalRed,
    SignalGreen,
}

/// 告警事件, 发往语音边界, 只消费一次
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub track_id: u32,
    pub timestamp: f64,
}

/// 每条轨迹记录的信号灯状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalState {
    #[default]
    Unknown,
    Red,
    Green,
}

impl From<SignalColor> for SignalState {
    fn from(color: SignalColor) -> Self {
        match color {
            SignalColor::Red => SignalState::Red,
            SignalColor::Green => SignalState::Green,
        }
    }
}

/// 去抖判定的输入
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    Motion(&'a MotionResult),
    Signal(SignalColor),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertDebouncer {
    pub approach_cooldown_secs: f64,
    pub signal_reminder_secs: f64,
    pub red_min_confidence: f32,
    pub green_min_confidence: f32,
}

impl Default for AlertDebouncer {
    fn default() -> Self {
        Self::from_config(&AlertConfig::default())
    }
}

impl AlertDebouncer {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            approach_cooldown_secs: config.approach_cooldown_secs,
            signal_reminder_secs: config.signal_reminder_secs,
            red_min_confidence: config.red_min_confidence,
            green_min_confidence: config.green_min_confidence,
        }
    }

    /// 判定本次观测是否触发告警
    ///
    /// 触发后由调用方写回 `last_alert_time`; 信号灯观测无论是否触发, 调用方都要记录新状态。
    pub fn decide(
        &self,
        track: &Track,
        observation: Observation<'_>,
        confidence: f32,
        now: f64,
    ) -> Option<AlertKind> {
        match observation {
            Observation::Motion(motion) => self.decide_approach(track, motion, now),
            Observation::Signal(color) => self.decide_signal(track, color, confidence, now),
        }
    }

    pub fn decide_approach(&self, track: &Track, motion: &MotionResult, now: f64) -> Option<AlertKind> {
        if motion.is_approaching && track.secs_since_alert(now) > self.approach_cooldown_secs {
            Some(AlertKind::ApproachAlert)
        } else {
            None
        }
    }

    pub fn decide_signal(
        &self,
        track: &Track,
        color: SignalColor,
        confidence: f32,
        now: f64,
    ) -> Option<AlertKind> {
        let transition = track.signal != SignalState::from(color);
        let reminder_due = track.secs_since_alert(now) > self.signal_reminder_secs;
        if !(transition || reminder_due) {
            return None;
        }

        match color {
            SignalColor::Red if confidence >= self.red_min_confidence => Some(AlertKind::SignalRed),
            SignalColor::Green if confidence >= self.green_min_confidence => {
                Some(AlertKind::SignalGreen)
            }
            _ => None,
        }
    }
}
