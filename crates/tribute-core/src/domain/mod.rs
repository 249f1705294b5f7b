//! Domain model (ids, actions, tasks, rewards).

pub mod action;
pub mod ids;
pub mod reward;
pub mod task;

pub use action::{ActionKind, TaskAction};
pub use ids::{IdAllocator, TaskId};
pub use reward::{RewardConfig, RewardRedemption, RewardTable};
pub use task::{Payload, Task, TaskDraft, keys};
