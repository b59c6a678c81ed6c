//! 進度回報：把完成百分比推給目前連線的觀察者。
//!
//! 傳輸層持有 `mpsc::Sender` 的強參考並負責連線生命週期，
//! 這裡只存一個 `WeakSender`；連線關閉後升級失敗，就當作沒有觀察者。

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressMessage {
    Progress { progress: f64 },
}

/// 同一時間最多一個觀察者，後連線者取代前者
#[derive(Debug, Default)]
pub struct ObserverSlot {
    current: Mutex<Option<mpsc::WeakSender<ProgressMessage>>>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, sender: &mpsc::Sender<ProgressMessage>) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(sender.downgrade());
        }
    }

    pub fn detach(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.sender().is_some_and(|tx| !tx.is_closed())
    }

    /// 在鎖內只做升級，送出時鎖已釋放
    fn sender(&self) -> Option<mpsc::Sender<ProgressMessage>> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().and_then(mpsc::WeakSender::upgrade))
    }
}

/// 單次執行使用的回報器
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    slot: Option<Arc<ObserverSlot>>,
}

impl ProgressReporter {
    pub fn new(slot: Arc<ObserverSlot>) -> Self {
        Self { slot: Some(slot) }
    }

    pub fn detached() -> Self {
        Self { slot: None }
    }

    /// 回傳計算出的百分比；推送失敗一律丟棄，不影響管線
    pub fn report(&self, processed: usize, total: usize) -> Option<f64> {
        if total == 0 {
            return None;
        }
        let progress = processed as f64 / total as f64 * 100.0;

        let Some(sender) = self.slot.as_ref().and_then(|slot| slot.sender()) else {
            return Some(progress);
        };

        match sender.try_send(ProgressMessage::Progress { progress }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Progress observer is lagging, dropped {:.1}%", progress);
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("Progress observer closed, dropped {:.1}%", progress);
            }
        }

        Some(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(ProgressMessage::Progress { progress: 50.0 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "progress", "progress": 50.0}));
    }

    #[tokio::test]
    async fn test_report_pushes_to_attached_observer() {
        let slot = Arc::new(ObserverSlot::new());
        let (tx, mut rx) = mpsc::channel(8);
        slot.attach(&tx);

        let reporter = ProgressReporter::new(slot.clone());
        assert_eq!(reporter.report(1, 4), Some(25.0));
        assert_eq!(reporter.report(4, 4), Some(100.0));

        assert_eq!(rx.recv().await, Some(ProgressMessage::Progress { progress: 25.0 }));
        assert_eq!(rx.recv().await, Some(ProgressMessage::Progress { progress: 100.0 }));
    }

    #[tokio::test]
    async fn test_closed_observer_is_tolerated() {
        let slot = Arc::new(ObserverSlot::new());
        let (tx, rx) = mpsc::channel(1);
        slot.attach(&tx);
        assert!(slot.is_attached());

        drop(rx);
        let reporter = ProgressReporter::new(slot.clone());
        assert_eq!(reporter.report(1, 2), Some(50.0));

        // 傳輸層釋放 sender 後即視為沒有觀察者
        drop(tx);
        assert!(!slot.is_attached());
        assert_eq!(reporter.report(2, 2), Some(100.0));
    }

    #[tokio::test]
    async fn test_full_observer_drops_updates_without_blocking() {
        let slot = Arc::new(ObserverSlot::new());
        let (tx, mut rx) = mpsc::channel(1);
        slot.attach(&tx);

        let reporter = ProgressReporter::new(slot);
        reporter.report(1, 3);
        reporter.report(2, 3);
        reporter.report(3, 3);

        assert_eq!(
            rx.recv().await,
            Some(ProgressMessage::Progress {
                progress: 1.0 / 3.0 * 100.0
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detached_reporter_and_zero_total() {
        let reporter = ProgressReporter::detached();
        assert_eq!(reporter.report(1, 2), Some(50.0));
        assert_eq!(reporter.report(0, 0), None);
    }

    #[test]
    fn test_latest_observer_wins() {
        let slot = ObserverSlot::new();
        let (first, _first_rx) = mpsc::channel::<ProgressMessage>(1);
        let (second, _second_rx) = mpsc::channel::<ProgressMessage>(1);
        slot.attach(&first);
        slot.attach(&second);
        assert!(slot.sender().is_some_and(|tx| tx.same_channel(&second)));

        slot.detach();
        assert!(!slot.is_attached());
    }
}
