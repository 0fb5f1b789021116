/// 语音输出系统 (Audio Output System)
///
/// 告警与播报的发声边界, 不阻塞采集线程
/// - Utterance:  待播报内容 (告警类型或播报文本)
/// - Speaker:    发声能力 (日志 / 外部TTS程序)
/// - Dispatcher: 有界队列 + 固定工作线程池
pub mod dispatcher;
pub mod speaker;

pub use dispatcher::{AlertDispatcher, DispatchWorkers};
pub use speaker::{LogSpeaker, ProgramSpeaker, Speaker};

use crate::config::SpeechConfig;
use crate::tracking::AlertKind;

/// 一次待播报的内容
#[derive(Debug, Clone, PartialEq)]
pub enum Utterance {
    Alert(AlertKind),
    Summary(String),
}

impl Utterance {
    /// 按配置的短语解析出最终文本
    pub fn text(&self, speech: &SpeechConfig) -> String {
        match self {
            Utterance::Alert(AlertKind::ApproachAlert) => speech.approach_phrase.clone(),
            Utterance::Alert(AlertKind::SignalRed) => speech.red_phrase.clone(),
            Utterance::Alert(AlertKind::SignalGreen) => speech.green_phrase.clone(),
            Utterance::Summary(text) => text.clone(),
        }
    }
}
