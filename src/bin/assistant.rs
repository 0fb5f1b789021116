/// 过街助手 (Crossing Assistant)
///
/// 面向视障行人的实时路况助手
///
/// 系统架构:
/// 1. 采集线程: 读帧 → 检测 → 跟踪/告警 → 叠加层 → 发布最新帧
/// 2. 推流线程: 每个观看者一个MJPEG推流线程
/// 3. 语音线程: 告警派发工作线程池
/// 4. 主线程:   读取语音指令 (标准输入每行一条)
use std::io::BufRead;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::unbounded;
use image::RgbImage;
use mimalloc::MiMalloc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crossing_assist::audio::{AlertDispatcher, LogSpeaker, ProgramSpeaker, Speaker};
use crossing_assist::detection::{Detection, Detector, ReplayDetector};
use crossing_assist::input::ImageSequenceSource;
use crossing_assist::pipeline::serve_mjpeg;
use crossing_assist::voice::CommandListener;
use crossing_assist::{AssistConfig, AssistContext, Pipeline};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 过街助手参数
#[derive(Parser, Debug)]
#[command(author, version, about = "过街助手 - 实时路况语音告警", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写出默认配置)
    #[arg(short, long, default_value = "crossing_assist.json")]
    config: PathBuf,

    /// 图片序列目录 (摄像头替身)
    #[arg(short, long)]
    frames: PathBuf,

    /// 回放检测结果 (JSON Lines, 每行一帧)
    #[arg(short, long)]
    detections: Option<PathBuf>,

    /// MJPEG推流监听地址
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// 日志过滤 (RUST_LOG 优先)
    #[arg(long, default_value = "crossing_assist=info")]
    log: String,

    /// 覆盖配置中的采集帧率
    #[arg(long)]
    capture_fps: Option<f64>,

    /// 覆盖配置中的推流帧率
    #[arg(long)]
    stream_fps: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 过街助手启动");

    let mut config = AssistConfig::load(&args.config);
    if let Some(fps) = args.capture_fps {
        config.pipeline.capture_fps = fps;
    }
    if let Some(fps) = args.stream_fps {
        config.pipeline.stream_fps = fps;
    }
    config.validate()?;
    config.print_summary();

    // ========== 外部能力 ==========
    let source = ImageSequenceSource::open(&args.frames)
        .with_context(|| format!("cannot open frame directory {}", args.frames.display()))?;
    let detector: Box<dyn Detector> = match &args.detections {
        Some(path) => Box::new(
            ReplayDetector::open(path)
                .with_context(|| format!("cannot open detections {}", path.display()))?,
        ),
        None => {
            warn!("⚠️  未指定检测结果, 画面中不会出现目标");
            Box::new(|_: &RgbImage| -> anyhow::Result<Vec<Detection>> { Ok(Vec::new()) })
        }
    };
    let speaker: Arc<dyn Speaker> = match ProgramSpeaker::from_config(&config.speech) {
        Some(tts) => Arc::new(tts),
        None => {
            info!("🔇 未配置TTS程序, 播报内容写入日志");
            Arc::new(LogSpeaker)
        }
    };
    let (dispatcher, workers) = AlertDispatcher::start(
        speaker,
        config.speech.clone(),
        config.alerts.dispatch_workers,
        config.alerts.dispatch_queue,
    )?;

    // ========== 启动流水线 ==========
    let ctx = AssistContext::start(config, Box::new(source))?;
    let pipeline = Pipeline::spawn(ctx, detector, dispatcher.clone())?;
    let session = pipeline.session().clone();

    // ========== 推流 ==========
    let listener =
        TcpListener::bind(&args.bind).with_context(|| format!("cannot bind {}", args.bind))?;
    let frames = session.frames.clone();
    let (stream_fps, quality) = (
        session.config.pipeline.stream_fps,
        session.config.pipeline.jpeg_quality,
    );
    thread::Builder::new().name("mjpeg".into()).spawn(move || {
        if let Err(e) = serve_mjpeg(listener, frames, stream_fps, quality) {
            warn!("❌ 推流服务退出: {}", e);
        }
    })?;

    // ========== 语音指令 (标准输入) ==========
    let (commands_tx, commands_rx) = unbounded::<String>();
    let listener = CommandListener::new(
        commands_rx,
        session.summary_generator(),
        dispatcher,
        session.clock,
    );
    let voice = thread::Builder::new()
        .name("voice".into())
        .spawn(move || listener.run())?;

    info!("⌨️  输入 \"traffic situation\" 获取路况播报, Ctrl-D 退出");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() && commands_tx.send(line.to_string()).is_err() {
            break;
        }
    }

    drop(commands_tx);
    if voice.join().is_err() {
        warn!("⚠️  指令线程异常退出");
    }
    pipeline.shutdown();
    workers.join();
    info!("👋 过街助手已退出");
    Ok(())
}
