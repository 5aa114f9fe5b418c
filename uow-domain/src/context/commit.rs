use crate::error::RepositoryResult as Result;
use crate::persist::CommitReport;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// 后台提交句柄：可等待提交结果，也可中止尚未完成的提交。
///
/// 丢弃句柄不会取消提交，提交照常在后台完成，但其结果将无人观察。
#[derive(Debug)]
pub struct CommitHandle {
    task: JoinHandle<Result<CommitReport>>,
}

impl CommitHandle {
    pub(crate) fn new(task: JoinHandle<Result<CommitReport>>) -> Self {
        Self { task }
    }

    /// 中止提交；已经完成的提交不受影响
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for CommitHandle {
    type Output = Result<CommitReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_err)) => Poll::Ready(Err(join_err.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}
