//! 语音指令 (Voice Commands)
//!
//! 识别后的指令文本经通道送入; 路况查询指令生成播报并交给语音派发。

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::audio::{AlertDispatcher, Utterance};
use crate::pipeline::SessionClock;
use crate::tracking::SummaryGenerator;

/// 同时包含 "traffic" 与 "situation" (不区分大小写)
pub fn is_summary_command(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("traffic") && text.contains("situation")
}

pub struct CommandListener {
    commands: Receiver<String>,
    summary: SummaryGenerator,
    dispatcher: AlertDispatcher,
    clock: SessionClock,
}

impl CommandListener {
    pub fn new(
        commands: Receiver<String>,
        summary: SummaryGenerator,
        dispatcher: AlertDispatcher,
        clock: SessionClock,
    ) -> Self {
        Self {
            commands,
            summary,
            dispatcher,
            clock,
        }
    }

    /// 处理一条指令, 返回生成的播报文本
    pub fn handle(&self, text: &str, now: f64) -> Option<String> {
        if !is_summary_command(text) {
            debug!("忽略指令: {:?}", text);
            return None;
        }
        let summary = self.summary.summarize(now);
        info!("🗺️  路况播报: {}", summary);
        self.dispatcher.dispatch(Utterance::Summary(summary.clone()));
        Some(summary)
    }

    /// 阻塞处理指令, 通道关闭后返回
    pub fn run(self) {
        info!("🎙️  语音指令监听启动");
        for text in self.commands.iter() {
            self.handle(&text, self.clock.now());
        }
        info!("🎙️  语音指令监听退出");
    }
}
