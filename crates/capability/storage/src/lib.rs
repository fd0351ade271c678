//! # 模板继承存储模块
//!
//! 继承引擎的外部协作者接口及其内存实现。
//!
//! ## 模块说明
//!
//! - [`traits`]：协作者接口（LinkDirectory、ObjectReader、ObjectPersister、UnitOfWork、PermissionChecker）
//! - [`error`]：存储错误类型定义
//! - [`validation`]：上下文校验函数
//! - [`permissions`]：基于角色的写权限判定
//! - [`in_memory`]：内存存储实现
//!   - 使用 `RwLock` 保护全部表，事务开始时整体快照
//!   - 适用于单元测试、集成测试和 CLI 快照同步
//!
//! ## 设计约束
//!
//! - **显式上下文**：所有数据访问方法必须显式接收 `SyncContext`
//! - **批量接口**：按 ID / 父对象 ID / 所属主机批量读取，避免逐条查询
//! - **保序写入**：`save` 返回的 ID 与输入顺序一致

pub mod error;
pub mod in_memory;
pub mod permissions;
pub mod traits;
pub mod validation;

pub use error::*;
pub use in_memory::{InMemoryConfigStore, StoreState, StoredObject};
pub use permissions::*;
pub use traits::*;
pub use validation::*;
