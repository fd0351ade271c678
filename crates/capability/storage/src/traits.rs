//! 协作者接口 Trait 定义
//!
//! 继承引擎只通过以下接口访问外部状态：
//! - LinkDirectory：模板链接目录
//! - ObjectReader / ObjectPersister：按对象种类的批量读取与写入
//! - UnitOfWork：事务边界
//! - PermissionChecker：写权限判定（由调用方在进入引擎前检查）
//!
//! 设计原则：
//! - 所有接口显式接收 SyncContext
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{ConfigObject, HostId, HostInfo, NaturalKey, ObjectId, SyncContext};

/// 模板链接目录
///
/// 只返回直接链接；多级模板由调度器逐层展开。
#[async_trait]
pub trait LinkDirectory: Send + Sync {
    /// 直接链接到任一模板的主机/模板，可按主机 ID 过滤
    async fn resolve_linked_hosts(
        &self,
        ctx: &SyncContext,
        template_ids: &[HostId],
        host_filter: Option<&[HostId]>,
    ) -> Result<Vec<HostInfo>, StorageError>;

    /// 按 ID 查询主机
    async fn find_hosts(
        &self,
        ctx: &SyncContext,
        host_ids: &[HostId],
    ) -> Result<Vec<HostInfo>, StorageError>;

    /// 按名称查询主机（触发器表达式以名称引用主机）
    async fn find_hosts_by_name(
        &self,
        ctx: &SyncContext,
        names: &[String],
    ) -> Result<Vec<HostInfo>, StorageError>;
}

/// 对象读取接口
#[async_trait]
pub trait ObjectReader<T: ConfigObject>: Send + Sync {
    async fn find_by_ids(&self, ctx: &SyncContext, ids: &[ObjectId])
    -> Result<Vec<T>, StorageError>;

    /// 继承自给定父对象的子对象，可限定所属主机
    async fn find_by_template_ids(
        &self,
        ctx: &SyncContext,
        template_ids: &[ObjectId],
        host_ids: Option<&[HostId]>,
    ) -> Result<Vec<T>, StorageError>;

    async fn find_by_natural_key(
        &self,
        ctx: &SyncContext,
        owner_id: &str,
        key: &NaturalKey,
    ) -> Result<Option<T>, StorageError>;

    async fn find_by_owners(
        &self,
        ctx: &SyncContext,
        owner_ids: &[HostId],
    ) -> Result<Vec<T>, StorageError>;

    /// 以给定对象为依赖目标的对象（反向边）
    async fn find_by_dependency_ids(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<Vec<T>, StorageError>;
}

/// 对象写入接口
#[async_trait]
pub trait ObjectPersister<T: ConfigObject>: Send + Sync {
    /// 批量新增/更新，返回的 ID 与输入顺序一致
    async fn save(&self, ctx: &SyncContext, objects: Vec<T>) -> Result<Vec<ObjectId>, StorageError>;

    /// 替换给定对象的全部出边
    async fn save_edges(
        &self,
        ctx: &SyncContext,
        edges: Vec<(ObjectId, Vec<ObjectId>)>,
    ) -> Result<(), StorageError>;

    async fn delete(&self, ctx: &SyncContext, ids: &[ObjectId]) -> Result<(), StorageError>;
}

/// 读写合一的对象存储
pub trait ObjectStore<T: ConfigObject>: ObjectReader<T> + ObjectPersister<T> {}

impl<T: ConfigObject, S: ObjectReader<T> + ObjectPersister<T> + ?Sized> ObjectStore<T> for S {}

/// 事务边界：整个级联要么全部提交，要么全部回滚
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self, ctx: &SyncContext) -> Result<(), StorageError>;
    async fn commit(&self, ctx: &SyncContext) -> Result<(), StorageError>;
    async fn rollback(&self, ctx: &SyncContext) -> Result<(), StorageError>;
}

/// 写权限判定
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn can_write(&self, ctx: &SyncContext, owner_ids: &[HostId])
    -> Result<bool, StorageError>;
}
