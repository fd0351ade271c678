//! 按对象种类定制的传播策略。
//!
//! 调度器只负责通用流程（分层、解析、批量写入、依赖重写、逐层下推），
//! 种类差异通过本 Trait 注入。

use crate::cloner::{ChildIndex, CloneContext};
use crate::error::InheritError;
use async_trait::async_trait;
use domain::{ConfigObject, HostInfo, NaturalKey, ObjectId, SyncContext};

#[async_trait]
pub trait InheritStrategy<T: ConfigObject>: Send + Sync {
    /// 传播一轮之前对整批父对象的校验。
    async fn validate_pass(
        &self,
        _ctx: &SyncContext,
        _parents: &[T],
        _hosts: &[HostInfo],
    ) -> Result<(), InheritError> {
        Ok(())
    }

    fn accepts_host(&self, _host: &HostInfo) -> bool {
        true
    }

    /// 加载克隆时需要的批次外子对象（例如发现规则的子规则）。
    async fn load_remap(
        &self,
        _ctx: &SyncContext,
        _parents: &[T],
        _hosts: &[HostInfo],
    ) -> Result<ChildIndex, InheritError> {
        Ok(ChildIndex::default())
    }

    /// 子对象在目标主机上的自然键。
    fn child_key(&self, parent: &T, cx: &CloneContext<'_>) -> Result<NaturalKey, InheritError>;

    /// 生成未保存的子对象；`existing` 为已解析到的子对象（更新或收编）。
    fn clone_for_host(
        &self,
        parent: &T,
        cx: &CloneContext<'_>,
        existing: Option<&T>,
    ) -> Result<T, InheritError>;

    fn check_adoption(
        &self,
        _clone: &T,
        _existing: &T,
        _host: &HostInfo,
    ) -> Result<(), InheritError> {
        Ok(())
    }

    /// 依赖目标在目标主机上没有子对象时的处理：返回保留的目标 ID 或报错。
    async fn unresolved_dependency(
        &self,
        ctx: &SyncContext,
        parent: &T,
        dependency_id: &str,
        host: &HostInfo,
    ) -> Result<ObjectId, InheritError>;

    /// 解除链接但保留子对象时，断开子对象与父对象的关联。
    fn detach(&self, child: &mut T) {
        child.set_template_id(None);
    }

    /// 删除时是否连带删除依赖于被删对象的对象。
    fn cascades_to_dependents(&self) -> bool {
        false
    }
}

/// 三种对象共用的基础克隆：归属目标主机，指回父对象，沿用已有子对象的 ID 与依赖。
pub fn inherit_base<T: ConfigObject>(parent: &T, host: &HostInfo, existing: Option<&T>) -> T {
    let mut child = parent.clone();
    child.set_owner_id(host.host_id.clone());
    child.set_template_id(parent.id().map(str::to_string));
    match existing {
        Some(existing) => {
            if let Some(id) = existing.id() {
                child.set_id(id.to_string());
            }
            child.set_dependency_ids(existing.dependency_ids());
        }
        None => {
            child.clear_id();
            child.set_dependency_ids(Vec::new());
        }
    }
    child
}

