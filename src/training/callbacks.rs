use crate::training::{EpochRecord, TrainingHistory};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Training callback trait
///
/// Callbacks allow custom actions to be performed at various points during training.
pub trait TrainingCallback {
    /// Called at the start of training
    fn on_train_begin(&mut self, _total_epochs: usize) {}

    /// Called at the end of training
    fn on_train_end(&mut self, _history: &TrainingHistory) {}

    /// Called at the start of each epoch (1-based)
    fn on_epoch_begin(&mut self, _epoch: usize) {}

    /// Called at the end of each epoch
    fn on_epoch_end(&mut self, _record: &EpochRecord, _history: &TrainingHistory) {}
}

/// Callback manager that handles multiple callbacks
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainingCallback>>,
}

impl CallbackManager {
    /// Create new callback manager
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a callback
    pub fn add_callback<C: TrainingCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn on_train_begin(&mut self, total_epochs: usize) {
        for callback in &mut self.callbacks {
            callback.on_train_begin(total_epochs);
        }
    }

    pub fn on_train_end(&mut self, history: &TrainingHistory) {
        for callback in &mut self.callbacks {
            callback.on_train_end(history);
        }
    }

    pub fn on_epoch_begin(&mut self, epoch: usize) {
        for callback in &mut self.callbacks {
            callback.on_epoch_begin(epoch);
        }
    }

    pub fn on_epoch_end(&mut self, record: &EpochRecord, history: &TrainingHistory) {
        for callback in &mut self.callbacks {
            callback.on_epoch_end(record, history);
        }
    }
}

/// Logs epoch metrics through `tracing`
pub struct ProgressLoggerCallback {
    log_frequency: usize,
}

impl ProgressLoggerCallback {
    /// Log every `log_frequency` epochs
    pub fn new(log_frequency: usize) -> Self {
        Self {
            log_frequency: log_frequency.max(1),
        }
    }
}

impl TrainingCallback for ProgressLoggerCallback {
    fn on_epoch_end(&mut self, record: &EpochRecord, _history: &TrainingHistory) {
        if record.epoch % self.log_frequency != 0 {
            return;
        }
        match (record.val_loss, record.val_accuracy) {
            (Some(val_loss), Some(val_acc)) => tracing::info!(
                "Epoch {} - loss: {:.4}, acc: {:.4}, val_loss: {:.4}, val_acc: {:.4}",
                record.epoch,
                record.loss,
                record.accuracy,
                val_loss,
                val_acc
            ),
            _ => tracing::info!(
                "Epoch {} - loss: {:.4}, acc: {:.4}",
                record.epoch,
                record.loss,
                record.accuracy
            ),
        }
    }
}

/// Progress bar over epochs
pub struct ProgressBarCallback {
    bar: Option<ProgressBar>,
}

impl ProgressBarCallback {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for ProgressBarCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingCallback for ProgressBarCallback {
    fn on_train_begin(&mut self, total_epochs: usize) {
        let bar = ProgressBar::new(total_epochs as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            bar.set_style(style);
        }
        self.bar = Some(bar);
    }

    fn on_epoch_end(&mut self, record: &EpochRecord, _history: &TrainingHistory) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("loss {:.4} acc {:.4}", record.loss, record.accuracy));
            bar.inc(1);
        }
    }

    fn on_train_end(&mut self, _history: &TrainingHistory) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message("training complete");
        }
    }
}

/// Writes the history as JSON after every epoch
pub struct HistoryWriterCallback {
    path: PathBuf,
}

impl HistoryWriterCallback {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn save(&self, history: &TrainingHistory) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(history)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl TrainingCallback for HistoryWriterCallback {
    fn on_epoch_end(&mut self, _record: &EpochRecord, history: &TrainingHistory) {
        if let Err(e) = self.save(history) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }

    fn on_train_end(&mut self, history: &TrainingHistory) {
        if let Err(e) = self.save(history) {
            tracing::warn!("Failed to save final history: {}", e);
        }
    }
}

/// Timer callback that tracks training time
#[derive(Default)]
pub struct TimerCallback {
    start_time: Option<Instant>,
    epoch_start: Option<Instant>,
    epoch_times: Vec<Duration>,
}

impl TimerCallback {
    /// Create new timer callback
    pub fn new() -> Self {
        Self::default()
    }

    /// Get average epoch time
    pub fn average_epoch_time(&self) -> Option<Duration> {
        if self.epoch_times.is_empty() {
            None
        } else {
            let total: Duration = self.epoch_times.iter().sum();
            Some(total / self.epoch_times.len() as u32)
        }
    }
}

impl TrainingCallback for TimerCallback {
    fn on_train_begin(&mut self, _total_epochs: usize) {
        self.start_time = Some(Instant::now());
        tracing::info!("Training started");
    }

    fn on_epoch_begin(&mut self, _epoch: usize) {
        self.epoch_start = Some(Instant::now());
    }

    fn on_epoch_end(&mut self, record: &EpochRecord, _history: &TrainingHistory) {
        if let Some(start) = self.epoch_start.take() {
            let elapsed = start.elapsed();
            tracing::debug!("Epoch {} took {:.2?}", record.epoch, elapsed);
            self.epoch_times.push(elapsed);
        }
    }

    fn on_train_end(&mut self, history: &TrainingHistory) {
        if let Some(start) = self.start_time {
            tracing::info!(
                "Training completed in {:.2?} ({} epochs, {:.2?} per epoch)",
                start.elapsed(),
                history.len(),
                self.average_epoch_time().unwrap_or_default()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl TrainingCallback for Recorder {
        fn on_train_begin(&mut self, total_epochs: usize) {
            self.events.borrow_mut().push(format!("begin {}", total_epochs));
        }
        fn on_epoch_end(&mut self, record: &EpochRecord, _history: &TrainingHistory) {
            self.events.borrow_mut().push(format!("epoch {}", record.epoch));
        }
        fn on_train_end(&mut self, history: &TrainingHistory) {
            self.events.borrow_mut().push(format!("end {}", history.len()));
        }
    }

    fn record(epoch: usize) -> EpochRecord {
        EpochRecord {
            epoch,
            loss: 0.5,
            accuracy: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_callback_manager_dispatch() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager = CallbackManager::new();
        manager.add_callback(Recorder {
            events: Rc::clone(&events),
        });
        manager.add_callback(ProgressLoggerCallback::new(1));
        manager.add_callback(TimerCallback::new());

        let mut history = TrainingHistory::new();
        manager.on_train_begin(2);
        for epoch in 1..=2 {
            manager.on_epoch_begin(epoch);
            history.push(record(epoch));
            manager.on_epoch_end(&record(epoch), &history);
        }
        manager.on_train_end(&history);

        assert_eq!(
            *events.borrow(),
            vec!["begin 2", "epoch 1", "epoch 2", "end 2"]
        );
    }

    #[test]
    fn test_timer_tracks_epochs() {
        let mut timer = TimerCallback::new();
        let history = TrainingHistory::new();
        assert!(timer.average_epoch_time().is_none());

        timer.on_train_begin(1);
        timer.on_epoch_begin(1);
        timer.on_epoch_end(&record(1), &history);
        assert!(timer.average_epoch_time().is_some());
    }

    #[test]
    fn test_history_writer() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("reports/history.json");
        let mut writer = HistoryWriterCallback::new(&path);

        let mut history = TrainingHistory::new();
        history.push(record(1));
        writer.on_epoch_end(&record(1), &history);

        let saved: TrainingHistory =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.epochs, history.epochs);
    }
}
