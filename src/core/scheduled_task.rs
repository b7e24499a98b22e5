/*
 * A handle to a spawned background task that can be canceled deterministically.
 * Canceling aborts the task at its next suspension point, so a canceled poll loop
 * never touches the store again. Dropping the handle cancels too, which ties a
 * task's lifetime to whoever owns the handle.
 */
use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawns `future` on the current tokio runtime.
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        log::debug!("ScheduledTask: Starting '{name}'.");
        ScheduledTask {
            name,
            handle: Some(tokio::spawn(future)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the task. Calling it again is harmless.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("ScheduledTask: Canceled '{}'.", self.name);
        }
    }

    /// True once canceled or once the task ran to completion.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ticking_task(counter: Arc<AtomicU32>) -> ScheduledTask {
        ScheduledTask::spawn("ticker", async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_ticks() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut task = ticking_task(Arc::clone(&counter));

        tokio::time::sleep(Duration::from_millis(250)).await;
        let before = counter.load(Ordering::SeqCst);
        assert_eq!(before, 3);

        task.cancel();
        task.cancel();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), before);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let counter = Arc::new(AtomicU32::new(0));
        let task = ticking_task(Arc::clone(&counter));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(task);
        let before = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), before);
    }
}
