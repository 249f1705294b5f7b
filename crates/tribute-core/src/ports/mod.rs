//! Ports - 抽象化レイヤー
//!
//! 外部システム（チャットプラットフォーム、コミュニティサーバー、通知先）と
//! 時刻へのインターフェース。オーケストレーターはこれらの trait だけに依存します。

pub mod clock;
pub mod notifier;
pub mod platform;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::notifier::Notifier;
pub use self::platform::{ChatPlatform, CommunityPlatform, CredentialKind};
