/// 视频输入系统 (Video Input System)
///
/// 采集线程独占帧源, 逐帧读取RGB图像
/// - FrameSource:         摄像头边界 (探测分辨率 + 读帧)
/// - ImageSequenceSource: 图片目录回放, 作为摄像头替身
pub mod sequence;

use image::RgbImage;

pub use sequence::ImageSequenceSource;

/// 帧源 (摄像头等外部能力)
///
/// 由采集线程独占; 释放 (drop) 即关闭设备。
pub trait FrameSource: Send {
    /// 探测画面尺寸 (宽, 高), 启动时调用一次
    fn probe(&mut self) -> anyhow::Result<(u32, u32)>;

    /// 读取下一帧; 失败视为瞬时错误, 调用方退避后重试
    fn read(&mut self) -> anyhow::Result<RgbImage>;
}
