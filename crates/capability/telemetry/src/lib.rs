//! 追踪、请求 ID 生成与传播计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 传播指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub objects_created: u64,
    pub objects_updated: u64,
    pub objects_adopted: u64,
    pub objects_unchanged: u64,
    pub edges_written: u64,
    pub passes: u64,
    pub cascades_committed: u64,
    pub cascades_aborted: u64,
}

/// 进程级传播指标。
pub struct PropagationMetrics {
    objects_created: AtomicU64,
    objects_updated: AtomicU64,
    objects_adopted: AtomicU64,
    objects_unchanged: AtomicU64,
    edges_written: AtomicU64,
    passes: AtomicU64,
    cascades_committed: AtomicU64,
    cascades_aborted: AtomicU64,
}

impl Default for PropagationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PropagationMetrics {
    pub fn new() -> Self {
        Self {
            objects_created: AtomicU64::new(0),
            objects_updated: AtomicU64::new(0),
            objects_adopted: AtomicU64::new(0),
            objects_unchanged: AtomicU64::new(0),
            edges_written: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            cascades_committed: AtomicU64::new(0),
            cascades_aborted: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects_created: self.objects_created.load(Ordering::Relaxed),
            objects_updated: self.objects_updated.load(Ordering::Relaxed),
            objects_adopted: self.objects_adopted.load(Ordering::Relaxed),
            objects_unchanged: self.objects_unchanged.load(Ordering::Relaxed),
            edges_written: self.edges_written.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            cascades_committed: self.cascades_committed.load(Ordering::Relaxed),
            cascades_aborted: self.cascades_aborted.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<PropagationMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static PropagationMetrics {
    METRICS.get_or_init(PropagationMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录新建的子对象数。
pub fn record_objects_created(count: u64) {
    metrics().objects_created.fetch_add(count, Ordering::Relaxed);
}

/// 记录原地更新的子对象数。
pub fn record_objects_updated(count: u64) {
    metrics().objects_updated.fetch_add(count, Ordering::Relaxed);
}

/// 记录被收编的手工对象数。
pub fn record_objects_adopted(count: u64) {
    metrics().objects_adopted.fetch_add(count, Ordering::Relaxed);
}

/// 记录无差异跳过的子对象数。
pub fn record_objects_unchanged(count: u64) {
    metrics()
        .objects_unchanged
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录写入的依赖边集合数。
pub fn record_edges_written(count: u64) {
    metrics().edges_written.fetch_add(count, Ordering::Relaxed);
}

/// 记录传播轮次。
pub fn record_pass() {
    metrics().passes.fetch_add(1, Ordering::Relaxed);
}

/// 记录提交的级联。
pub fn record_cascade_committed() {
    metrics()
        .cascades_committed
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录回滚的级联。
pub fn record_cascade_aborted() {
    metrics().cascades_aborted.fetch_add(1, Ordering::Relaxed);
}
