//! Per-task progress stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use modelroute_core::{ProgressEvent, TaskId};

/// Ordered status transitions of one task, ending with exactly one terminal
/// event.
///
/// Dropping the stream before the terminal event cancels the task.
pub struct ProgressStream {
    task_id: TaskId,
    inner: ReceiverStream<ProgressEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl ProgressStream {
    pub(crate) fn new(
        task_id: TaskId,
        rx: mpsc::Receiver<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            inner: ReceiverStream::new(rx),
            cancel,
            finished: false,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Ask the engine to cancel the task. The stream still ends with a
    /// terminal event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Skip intermediate events and return the terminal one.
    pub async fn wait_terminal(mut self) -> Option<ProgressEvent> {
        while let Some(event) = self.next().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        match &polled {
            Poll::Ready(Some(event)) if event.is_terminal() => self.finished = true,
            Poll::Ready(None) => self.finished = true,
            _ => {}
        }
        polled
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        if !self.finished && !self.cancel.is_cancelled() {
            debug!(task_id = %self.task_id, "Progress stream dropped, cancelling task");
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelroute_core::{BackendId, Context as TaskContext, SessionId, TaskResult, TaskStatus};

    fn terminal(id: &TaskId) -> ProgressEvent {
        ProgressEvent::terminal(
            TaskStatus::Completed,
            1,
            TaskResult::completed(
                id.clone(),
                "ok",
                0.9,
                BackendId::Phi,
                TaskContext::new(SessionId::new("s")),
            ),
        )
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let id = TaskId::new("t1");
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut stream = ProgressStream::new(id.clone(), rx, cancel.clone());

        tx.send(ProgressEvent::running(id.clone(), BackendId::Phi, 1))
            .await
            .unwrap();
        tx.send(terminal(&id)).await.unwrap();

        assert_eq!(stream.next().await.unwrap().status, TaskStatus::Running);
        assert!(stream.next().await.unwrap().is_terminal());
        assert!(stream.next().await.is_none());

        drop(stream);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_drop_before_terminal_cancels() {
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let stream = ProgressStream::new(TaskId::new("t1"), rx, cancel.clone());

        drop(stream);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_terminal_skips_progress() {
        let id = TaskId::new("t1");
        let (tx, rx) = mpsc::channel(8);
        let stream = ProgressStream::new(id.clone(), rx, CancellationToken::new());

        tx.send(ProgressEvent::running(id.clone(), BackendId::Phi, 1))
            .await
            .unwrap();
        tx.send(ProgressEvent::retrying(id.clone(), BackendId::Phi, 1, "low"))
            .await
            .unwrap();
        tx.send(terminal(&id)).await.unwrap();

        let event = stream.wait_terminal().await.unwrap();
        assert_eq!(event.status, TaskStatus::Completed);
        assert_eq!(event.result.unwrap().output, "ok");
    }
}
