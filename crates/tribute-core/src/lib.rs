//! tribute-core
//!
//! Task orchestration for reward-redemption bot actions.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, action, task, reward）
//! - **queue**: 5つのタスクコレクションと操作 API
//! - **store**: TOML へのタスク永続化
//! - **executor**: action ごとの外部呼び出し
//! - **grants**: 権限付与ログと期限切れの取り消し
//! - **credentials**: 認証情報の定期更新
//! - **app**: メインループ・instant ループ・ダッシュボード
//! - **ports**: 外部システムへのインターフェース
//! - **impls**: dry-run 実装

pub mod app;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod executor;
pub mod grants;
pub mod impls;
pub mod logging;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Collaborators, Dashboard, Orchestrator, OrchestratorHandle, Transition};
pub use config::AppConfig;
pub use logging::init_logging;
