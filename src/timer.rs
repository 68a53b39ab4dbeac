use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A scheduled callback that has not fired yet. Cancelled on drop.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs `callback` on `runtime` once `delay` has elapsed.
///
/// The callback is synchronous, so cancelling after the delay has elapsed
/// can never interrupt it half way.
pub fn schedule<F>(runtime: &Handle, delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let task = runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        callback();
    });
    TimerHandle { task }
}
