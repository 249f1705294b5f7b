//! Impls - ports の実装（開発用）
//!
//! 本物のチャットプラットフォームのクライアントはこのクレートの外に置きます。
//! ここにはローカル実行用の dry-run 実装だけを含めます。

pub mod dry_run;

pub use self::dry_run::{DryRunChat, DryRunCommunity, TracingNotifier};
