//! Модуль для реализации системы уведомлений
//!
//! Конкретные наблюдатели для системы прогресса.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::progress::{ProgressInfo, ProgressObserver, ProgressUpdate};

/// Наблюдатель, выводящий информацию о прогрессе в лог
pub struct LogProgressObserver {
    /// Префикс для вывода (опционально)
    prefix: Option<String>,
}

impl LogProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Default for LogProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

/// Строковое представление обновления для логов и UI
pub fn describe(update: &ProgressUpdate) -> String {
    match update {
        ProgressUpdate::Batch { completed, total, message } => {
            format!("[{}/{}] {}", completed, total, message)
        }
        ProgressUpdate::Overall { percent, message } => format!("{:.1}% {}", percent, message),
        ProgressUpdate::Finished => "finished".to_string(),
    }
}

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        log::info!(
            "{}{} {}",
            prefix,
            progress.timestamp.format("%H:%M:%S"),
            describe(&progress.update)
        );
    }
}

/// Наблюдатель, сохраняющий информацию о прогрессе в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю обновлений прогресса
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    /// Только обновления по пакетам, в порядке поступления
    pub fn batch_updates(&self) -> Vec<(usize, usize, String)> {
        self.history
            .lock()
            .iter()
            .filter_map(|info| match &info.update {
                ProgressUpdate::Batch { completed, total, message } => {
                    Some((*completed, *total, message.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова при обновлении прогресса
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Комбинированный наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{progress_channel, send_progress, spawn_observer, ProgressTracker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn batch(completed: usize, total: usize) -> ProgressInfo {
        ProgressInfo::new(ProgressUpdate::Batch {
            completed,
            total,
            message: format!("{} of {}", completed, total),
        })
    }

    #[test]
    fn test_log_observer() {
        let observer = LogProgressObserver::with_prefix("[Test] ");
        // Проверяем только отсутствие паники
        observer.on_progress_update(batch(1, 2));
    }

    #[test]
    fn test_memory_observer() {
        let observer = MemoryProgressObserver::new();
        observer.on_progress_update(batch(10, 25));
        observer.on_progress_update(ProgressInfo::new(ProgressUpdate::Overall {
            percent: 40.0,
            message: "cycle".to_string(),
        }));
        observer.on_progress_update(batch(20, 25));

        assert_eq!(observer.history().len(), 3);
        let batches = observer.batch_updates();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].0, 20);

        observer.clear_history();
        assert!(observer.history().is_empty());
    }

    #[test]
    fn test_composite_observer() {
        let memory_observer = MemoryProgressObserver::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let mut composite = CompositeProgressObserver::new();
        composite.add_observer(Box::new(memory_observer.clone()));
        composite.add_observer(Box::new(CallbackProgressObserver::new(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })));

        composite.on_progress_update(batch(1, 1));

        assert_eq!(memory_observer.history().len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_describe() {
        let text = describe(&ProgressUpdate::Batch {
            completed: 10,
            total: 25,
            message: "Synthesized batch 1/3".to_string(),
        });
        assert_eq!(text, "[10/25] Synthesized batch 1/3");
        assert_eq!(describe(&ProgressUpdate::Finished), "finished");
    }

    /// Составной наблюдатель за каналом получает все обновления по порядку
    #[tokio::test]
    async fn test_composite_observer_behind_channel() {
        let timeline = MemoryProgressObserver::new();
        let percents = Arc::new(Mutex::new(Vec::new()));
        let sink = percents.clone();

        let mut composite = CompositeProgressObserver::new();
        composite.add_observer(Box::new(LogProgressObserver::new()));
        composite.add_observer(Box::new(timeline.clone()));
        composite.add_observer(Box::new(CallbackProgressObserver::new(move |info| {
            if let ProgressUpdate::Overall { percent, .. } = info.update {
                sink.lock().push(percent);
            }
        })));

        let (tx, rx) = progress_channel();
        let handle = spawn_observer(rx, Arc::new(composite));
        let tracker = ProgressTracker::new(2);
        send_progress(Some(&tx), batch(2, 2).update).await;
        send_progress(Some(&tx), tracker.overall_update(1, "one")).await;
        send_progress(Some(&tx), tracker.overall_update(2, "two")).await;
        send_progress(Some(&tx), ProgressUpdate::Finished).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*percents.lock(), vec![50.0, 100.0]);
        let history = timeline.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].update, ProgressUpdate::Finished);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
