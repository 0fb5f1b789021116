//! 发声实现
//! Speaker boundary: the log speaker and an external text-to-speech program

use std::process::Command;

use anyhow::{bail, Context};
use tracing::info;

use crate::config::SpeechConfig;

/// 发声能力, 工作线程间共享
pub trait Speaker: Send + Sync {
    /// 播报一段文本, 返回时播报已结束
    fn speak(&self, text: &str) -> anyhow::Result<()>;
}

/// 仅写日志 (无音频设备时使用)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) -> anyhow::Result<()> {
        info!("🔊 {}", text);
        Ok(())
    }
}

/// 调用外部TTS程序, 文本作为最后一个参数
#[derive(Debug, Clone)]
pub struct ProgramSpeaker {
    program: String,
    args: Vec<String>,
}

impl ProgramSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 配置了 `tts_command` 时返回
    pub fn from_config(speech: &SpeechConfig) -> Option<Self> {
        let (program, args) = speech.tts_command.as_ref()?.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl Speaker for ProgramSpeaker {
    fn speak(&self, text: &str) -> anyhow::Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .status()
            .with_context(|| format!("failed to launch {}", self.program))?;
        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}
