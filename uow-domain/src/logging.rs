//! 日志初始化（logging）
//!
//! 进程内仅安装一次 `tracing` 订阅者；`RUST_LOG` 优先于各档位的默认过滤规则。
//!
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// 日志档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// 人类可读输出，默认 debug
    Development,
    /// JSON 结构化输出，默认 info
    Production,
    /// 测试：仅安装空注册表，不产生输出
    Test,
}

static INIT_ONCE: Once = Once::new();

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 安装全局订阅者；重复调用或已有其他订阅者时静默忽略
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter("uow_domain=debug"))
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter("uow_domain=info"))
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };

        if installed.is_err() {
            tracing::debug!(?profile, "global subscriber already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(Profile::Test);
        init(Profile::Development);
        init(Profile::Production);
    }
}
