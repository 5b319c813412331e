//! Multi-threaded mode: the reactor runs on its own tokio task and the TU
//! only touches the [`StackHandle`] queues.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::stack::{SipStack, StackHandle};

/// A [`SipStack`] running in the background
pub struct StackThread {
    handle: StackHandle,
    shutdown: Arc<Notify>,
    task: JoinHandle<SipStack>,
}

impl StackThread {
    /// Moves `stack` onto a tokio task and starts its loop. Must be called
    /// from within a tokio runtime.
    pub fn spawn(mut stack: SipStack) -> Self {
        let handle = stack.handle();
        let shutdown = stack.shutdown_signal();
        let task = tokio::spawn(async move {
            stack.run().await;
            stack
        });
        debug!("stack thread started");
        Self {
            handle,
            shutdown,
            task,
        }
    }

    /// Queue access for the TU
    pub fn handle(&self) -> &StackHandle {
        &self.handle
    }

    /// Stops the loop, closes the transports and gives the stack back
    pub async fn shutdown(self) -> Result<SipStack> {
        self.shutdown.notify_one();
        let stack = match self.task.await {
            Ok(stack) => stack,
            Err(e) => {
                error!("stack task failed: {}", e);
                return Err(Error::TaskFailed(e.to_string()));
            }
        };
        stack.close().await?;
        debug!("stack thread stopped");
        Ok(stack)
    }
}
