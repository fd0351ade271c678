//! 三种对象的传播策略。

pub mod host_prototype;
pub mod item;
pub mod trigger;

pub use host_prototype::HostPrototypeStrategy;
pub use item::ItemStrategy;
pub use trigger::TriggerStrategy;
