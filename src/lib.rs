// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod audio; // 语音输出与告警派发
pub mod config; // 助手配置参数
pub mod detection; // 检测边界与数据结构
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod pipeline; // 采集/推流流水线
pub mod tracking; // 轨迹、运动分类与告警去抖
pub mod voice; // 语音指令

pub use crate::config::AssistConfig;
pub use crate::error::{Error, Result};
pub use crate::pipeline::{AssistContext, Pipeline, PipelineHandle, Session};
