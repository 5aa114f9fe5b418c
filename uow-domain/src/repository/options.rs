use crate::context::CommitHandle;
use crate::error::RepositoryResult as Result;
use crate::persist::CommitReport;

/// 变更操作的提交选项
///
/// `run_async` 仅在 `save_after` 开启时生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    pub save_after: bool,
    pub run_async: bool,
}

impl SaveOptions {
    /// 只记录变更，由调用方稍后统一提交
    pub const fn deferred() -> Self {
        Self {
            save_after: false,
            run_async: false,
        }
    }

    /// 立即提交并等待存储完成
    pub const fn immediate() -> Self {
        Self {
            save_after: true,
            run_async: false,
        }
    }

    /// 立即派发提交到后台
    pub const fn background() -> Self {
        Self {
            save_after: true,
            run_async: true,
        }
    }
}

impl From<bool> for SaveOptions {
    fn from(save_after: bool) -> Self {
        Self {
            save_after,
            run_async: false,
        }
    }
}

/// 一次变更操作的提交结果
#[derive(Debug)]
pub enum CommitOutcome {
    /// 未请求提交
    Skipped,
    Completed(CommitReport),
    /// 提交已派发，结果经由句柄获得
    Pending(CommitHandle),
}

impl CommitOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CommitOutcome::Skipped)
    }

    pub fn report(&self) -> Option<&CommitReport> {
        match self {
            CommitOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    /// 等待提交完成；未请求提交时返回 `None`
    pub async fn wait(self) -> Result<Option<CommitReport>> {
        match self {
            CommitOutcome::Skipped => Ok(None),
            CommitOutcome::Completed(report) => Ok(Some(report)),
            CommitOutcome::Pending(handle) => handle.await.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_presets() {
        assert_eq!(SaveOptions::default(), SaveOptions::deferred());
        assert_eq!(SaveOptions::from(true), SaveOptions::immediate());
        assert!(SaveOptions::background().run_async);
    }

    #[tokio::test]
    async fn wait_on_settled_outcomes() {
        assert!(CommitOutcome::Skipped.wait().await.unwrap().is_none());

        let report = CommitReport::default();
        let outcome = CommitOutcome::Completed(report);
        assert_eq!(outcome.report().map(|r| r.total()), Some(0));
        assert_eq!(outcome.wait().await.unwrap(), Some(report));
    }
}
