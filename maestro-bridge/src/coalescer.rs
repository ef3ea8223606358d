//! Debouncing command queue.

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::command::{CommandKind, CommandValue};

/// Queue holding at most one pending value per [`CommandKind`].
///
/// A `put` for a kind that is already pending overwrites its value without
/// moving it, so dispatch order is the order in which kinds first arrived
/// and each dispatched command carries the latest value seen for its kind.
#[derive(Debug, Default)]
pub struct CommandCoalescer {
    pending: Mutex<IndexMap<CommandKind, f64>>,
    notify: Notify,
}

impl CommandCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command, or update the pending value of its kind.
    ///
    /// Returns `true` if the kind was not pending before.
    pub fn put(&self, command: CommandValue) -> bool {
        let added = self
            .pending
            .lock()
            .insert(command.kind, command.value)
            .is_none();
        self.notify.notify_one();
        added
    }

    /// Take the oldest pending kind without waiting.
    pub fn try_get(&self) -> Option<CommandValue> {
        self.pending
            .lock()
            .shift_remove_index(0)
            .map(|(kind, value)| CommandValue::new(kind, value))
    }

    /// Wait for a pending command and take the oldest one.
    pub async fn get(&self) -> CommandValue {
        loop {
            let notified = self.notify.notified();
            if let Some(command) = self.try_get() {
                return command;
            }
            notified.await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Number of distinct kinds pending.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    #[test]
    fn test_put_overwrites_in_place() {
        let queue = CommandCoalescer::new();

        assert!(queue.put(CommandValue::new(CommandKind::PowerLevel, 1.0)));
        assert!(queue.put(CommandValue::new(CommandKind::Power, 1.0)));
        assert!(!queue.put(CommandValue::new(CommandKind::PowerLevel, 4.0)));
        assert_eq!(queue.len(), 2);

        assert_eq!(
            queue.try_get(),
            Some(CommandValue::new(CommandKind::PowerLevel, 4.0))
        );
        assert_eq!(
            queue.try_get(),
            Some(CommandValue::new(CommandKind::Power, 1.0))
        );
        assert_eq!(queue.try_get(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_kind_requeued_after_take_goes_last() {
        let queue = CommandCoalescer::new();
        queue.put(CommandValue::new(CommandKind::EcoMode, 1.0));
        queue.put(CommandValue::new(CommandKind::SilentMode, 1.0));

        assert_eq!(queue.try_get().map(|c| c.kind), Some(CommandKind::EcoMode));
        queue.put(CommandValue::new(CommandKind::EcoMode, 0.0));

        assert_eq!(
            queue.try_get().map(|c| c.kind),
            Some(CommandKind::SilentMode)
        );
        assert_eq!(
            queue.try_get(),
            Some(CommandValue::new(CommandKind::EcoMode, 0.0))
        );
    }

    #[test]
    fn test_get_waits_for_put() {
        let queue = CommandCoalescer::new();
        let mut get = task::spawn(queue.get());

        assert_pending!(get.poll());

        queue.put(CommandValue::get_info());
        assert!(get.is_woken());
        assert_ready_eq!(get.poll(), CommandValue::get_info());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_get_returns_immediately_when_pending() {
        let queue = CommandCoalescer::new();
        queue.put(CommandValue::new(CommandKind::Power, 0.0));

        let mut get = task::spawn(queue.get());
        assert_ready_eq!(get.poll(), CommandValue::new(CommandKind::Power, 0.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers() {
        let queue = Arc::new(CommandCoalescer::new());
        let kinds = [
            CommandKind::PowerLevel,
            CommandKind::TemperatureSetpoint,
            CommandKind::FrontFan,
        ];

        let mut handles = Vec::new();
        for producer in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                for step in 0..100 {
                    let kind = kinds[(producer + step) % kinds.len()];
                    queue.put(CommandValue::new(kind, step as f64));
                    assert!(queue.len() <= kinds.len());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.len(), kinds.len());
        let mut drained = Vec::new();
        while let Some(command) = queue.try_get() {
            drained.push(command.kind);
        }
        assert_eq!(drained.len(), kinds.len());
        for kind in kinds {
            assert!(drained.contains(&kind));
        }
    }

    #[tokio::test]
    async fn test_get_from_another_task() {
        let queue = Arc::new(CommandCoalescer::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;

        queue.put(CommandValue::new(CommandKind::PowerLevel, 3.0));
        assert_eq!(
            consumer.await.unwrap(),
            CommandValue::new(CommandKind::PowerLevel, 3.0)
        );
    }
}
