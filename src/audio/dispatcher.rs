//! 告警派发 (Alert Dispatcher)
//!
//! 采集线程只做一次非阻塞入队; 发声在固定数量的工作线程中完成。
//! 队列满时丢弃本次告警, 播报失败只记录日志。

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::{Speaker, Utterance};
use crate::config::SpeechConfig;

/// 派发句柄, 可克隆后分发给采集线程与指令监听线程
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    tx: Sender<Utterance>,
}

/// 工作线程组; 所有派发句柄释放后工作线程自行退出
pub struct DispatchWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl AlertDispatcher {
    pub fn start(
        speaker: Arc<dyn Speaker>,
        speech: SpeechConfig,
        workers: usize,
        capacity: usize,
    ) -> std::io::Result<(Self, DispatchWorkers)> {
        let (tx, rx) = bounded::<Utterance>(capacity.max(1));
        let speech = Arc::new(speech);

        let mut handles = Vec::with_capacity(workers.max(1));
        for idx in 0..workers.max(1) {
            let rx = rx.clone();
            let speaker = Arc::clone(&speaker);
            let speech = Arc::clone(&speech);
            let handle = thread::Builder::new()
                .name(format!("speech-{}", idx))
                .spawn(move || worker_loop(idx, rx, speaker, speech))?;
            handles.push(handle);
        }
        info!("🔈 语音派发启动: {} 个工作线程, 队列 {}", handles.len(), capacity.max(1));

        Ok((Self { tx }, DispatchWorkers { handles }))
    }

    /// 非阻塞入队, 返回是否被接受
    pub fn dispatch(&self, utterance: Utterance) -> bool {
        match self.tx.try_send(utterance) {
            Ok(()) => true,
            Err(TrySendError::Full(u)) => {
                warn!("⚠️  语音队列已满, 丢弃: {:?}", u);
                false
            }
            Err(TrySendError::Disconnected(u)) => {
                warn!("⚠️  语音派发已关闭, 丢弃: {:?}", u);
                false
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

impl DispatchWorkers {
    /// 等待工作线程播完队列中剩余内容后退出
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("⚠️  语音工作线程异常退出");
            }
        }
    }
}

fn worker_loop(
    idx: usize,
    rx: Receiver<Utterance>,
    speaker: Arc<dyn Speaker>,
    speech: Arc<SpeechConfig>,
) {
    for utterance in rx.iter() {
        let text = utterance.text(&speech);
        debug!("🗣️  [speech-{}] {}", idx, text);
        if let Err(e) = speaker.speak(&text) {
            warn!("⚠️  播报失败: {:#}", e);
        }
    }
    debug!("speech-{} 退出", idx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::AlertKind;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    /// 记录播报文本
    struct Recorder(Sender<String>);

    impl Speaker for Recorder {
        fn speak(&self, text: &str) -> anyhow::Result<()> {
            let _ = self.0.send(text.to_string());
            Ok(())
        }
    }

    /// 第一次播报时阻塞, 直到测试放行
    struct Blocking {
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl Speaker for Blocking {
        fn speak(&self, _text: &str) -> anyhow::Result<()> {
            let _ = self.started.send(());
            let _ = self.release.recv();
            Ok(())
        }
    }

    struct Failing;

    impl Speaker for Failing {
        fn speak(&self, _text: &str) -> anyhow::Result<()> {
            anyhow::bail!("no audio device")
        }
    }

    #[test]
    fn test_alerts_are_spoken_with_configured_phrases() {
        let (tx, rx) = unbounded();
        let (dispatcher, workers) =
            AlertDispatcher::start(Arc::new(Recorder(tx)), SpeechConfig::default(), 1, 4).unwrap();

        assert!(dispatcher.dispatch(Utterance::Alert(AlertKind::ApproachAlert)));
        assert!(dispatcher.dispatch(Utterance::Summary("No objects are currently detected.".into())));

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "Caution! Object approaching.");
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "No objects are currently detected.");

        drop(dispatcher);
        workers.join();
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let speaker = Blocking {
            started: started_tx,
            release: release_rx,
        };
        let (dispatcher, workers) =
            AlertDispatcher::start(Arc::new(speaker), SpeechConfig::default(), 1, 1).unwrap();

        assert!(dispatcher.dispatch(Utterance::Alert(AlertKind::SignalRed)));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // 工作线程忙, 队列容量1
        assert!(dispatcher.dispatch(Utterance::Alert(AlertKind::SignalGreen)));
        assert!(!dispatcher.dispatch(Utterance::Alert(AlertKind::ApproachAlert)));
        assert_eq!(dispatcher.pending(), 1);

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        drop(dispatcher);
        workers.join();
    }

    #[test]
    fn test_speaker_errors_do_not_stop_workers() {
        let (dispatcher, workers) =
            AlertDispatcher::start(Arc::new(Failing), SpeechConfig::default(), 2, 4).unwrap();
        for _ in 0..3 {
            dispatcher.dispatch(Utterance::Alert(AlertKind::SignalRed));
        }
        drop(dispatcher);
        workers.join();
    }
}
