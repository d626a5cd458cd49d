pub mod config;
pub mod defaults;
pub mod event;
pub mod memory;
pub mod profile;
pub mod queue;
pub mod rule;
pub mod schedule;
pub mod subscription;
pub mod summary;
pub mod task;
pub mod trigger;
pub mod work;

pub use config::{
    ChannelConfig, Config, LoggingConfig, MemoryConfig, OrchestratorConfig, ProfileConfig,
    RulesConfig, ScheduleConfig,
};
pub use event::{Event, EventType};
pub use memory::{MemoryEntry, MemoryStats};
pub use profile::{parse_utc_offset, Alert, DeliveryChannel, UserProfile};
pub use queue::{QueueItem, TaskQueue};
pub use rule::{HopeRule, QuietHours, RuleId, RuleSchedule, RuleStatus};
pub use schedule::{JobId, ScheduledJob};
pub use subscription::SubscriptionTable;
pub use task::{Priority, Task, TaskId, TaskOrigin, TaskStatus, WorkerType};
pub use trigger::{EventTrigger, ItemTest, TriggerCondition, TriggerTable};
pub use work::WorkResult;
