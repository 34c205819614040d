//! Модуль для отслеживания прогресса выполнения операций
//!
//! Производители (планировщик пакетов, оркестратор) отправляют
//! [`ProgressUpdate`] в канал Tokio, единственный потребитель раздаёт их
//! наблюдателям. Канал безопасен для одновременной отправки из разных задач.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Размер буфера канала прогресса по умолчанию
pub const PROGRESS_CHANNEL_CAPACITY: usize = 100;

/// Отправитель обновлений прогресса
pub type ProgressSender = mpsc::Sender<ProgressUpdate>;

/// Обновление прогресса
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressUpdate {
    /// Завершён очередной пакет синтеза
    Batch {
        completed: usize,
        total: usize,
        message: String,
    },
    /// Общий прогресс конвейера (0.0 - 100.0)
    Overall { percent: f32, message: String },
    /// Конвейер завершён
    Finished,
}

/// Обновление прогресса с меткой времени
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub update: ProgressUpdate,
    pub timestamp: DateTime<Utc>,
}

impl ProgressInfo {
    pub fn new(update: ProgressUpdate) -> Self {
        Self {
            update,
            timestamp: Utc::now(),
        }
    }
}

/// Асинхронно отправляет обновление прогресса
pub async fn send_progress(sender: Option<&ProgressSender>, update: ProgressUpdate) {
    if let Some(sender) = sender {
        if let Err(e) = sender.send(update).await {
            log::debug!("Progress receiver dropped: {}", e);
        }
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трекер общего прогресса
///
/// Процент считается как доля сегментов в конечном состоянии и никогда не
/// уменьшается.
pub struct ProgressTracker {
    total: usize,
    percent: RwLock<f32>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            percent: RwLock::new(0.0),
        }
    }

    /// Обновить прогресс по числу завершённых сегментов и вернуть текущий процент
    pub fn record_settled(&self, settled: usize) -> f32 {
        let candidate = if self.total == 0 {
            100.0
        } else {
            (settled.min(self.total) as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
        };

        let mut percent = self.percent.write();
        if candidate > *percent {
            *percent = candidate;
        }
        *percent
    }

    pub fn percent(&self) -> f32 {
        *self.percent.read()
    }

    /// Построить обновление для отправки в канал
    pub fn overall_update(&self, settled: usize, message: impl Into<String>) -> ProgressUpdate {
        ProgressUpdate::Overall {
            percent: self.record_settled(settled),
            message: message.into(),
        }
    }
}

/// Запустить задачу, раздающую обновления из канала наблюдателю
///
/// Задача завершается, когда все отправители закрыты.
pub fn spawn_observer(
    mut rx: mpsc::Receiver<ProgressUpdate>,
    observer: Arc<dyn ProgressObserver>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            observer.on_progress_update(ProgressInfo::new(update));
        }
    })
}

/// Создать канал прогресса с буфером по умолчанию
pub fn progress_channel() -> (ProgressSender, mpsc::Receiver<ProgressUpdate>) {
    mpsc::channel(PROGRESS_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct TestObserver {
        updates: Arc<Mutex<Vec<ProgressInfo>>>,
    }

    impl ProgressObserver for TestObserver {
        fn on_progress_update(&self, progress: ProgressInfo) {
            self.updates.lock().push(progress);
        }
    }

    #[test]
    fn test_tracker_is_monotonic() {
        let tracker = ProgressTracker::new(4);
        assert_eq!(tracker.record_settled(1), 25.0);
        assert_eq!(tracker.record_settled(3), 75.0);
        // Меньшее значение не откатывает прогресс
        assert_eq!(tracker.record_settled(2), 75.0);
        assert_eq!(tracker.record_settled(10), 100.0);
        assert_eq!(tracker.percent(), 100.0);
    }

    #[test]
    fn test_empty_tracker_is_complete() {
        let tracker = ProgressTracker::new(0);
        assert_eq!(tracker.record_settled(0), 100.0);
    }

    #[tokio::test]
    async fn test_observer_receives_updates_from_channel() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let observer = Arc::new(TestObserver { updates: updates.clone() });

        let (tx, rx) = progress_channel();
        let handle = spawn_observer(rx, observer);

        let tracker = ProgressTracker::new(2);
        send_progress(Some(&tx), tracker.overall_update(1, "one")).await;
        send_progress(Some(&tx), ProgressUpdate::Finished).await;
        send_progress(None, ProgressUpdate::Finished).await;
        drop(tx);
        handle.await.unwrap();

        let updates = updates.lock();
        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[0].update,
            ProgressUpdate::Overall { percent: 50.0, message: "one".to_string() }
        );
        assert_eq!(updates[1].update, ProgressUpdate::Finished);
    }

    /// Отметка времени входит в JSON-отчёт о прогрессе
    #[test]
    fn test_progress_info_serializes_with_timestamp() {
        let info = ProgressInfo::new(ProgressUpdate::Overall {
            percent: 40.0,
            message: "cycle 1".to_string(),
        });

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"timestamp\""), "{}", json);

        let restored: ProgressInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.update, info.update);
        assert_eq!(restored.timestamp, info.timestamp);
    }
}
