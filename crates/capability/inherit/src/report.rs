//! 传播结果统计。

/// 一次引擎调用的统计结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// 传播轮次（每层模板一轮）。
    pub passes: usize,
    /// 处理过的 (轮次, 主机) 组合数。
    pub hosts: usize,
    pub created: usize,
    pub updated: usize,
    pub adopted: usize,
    pub unchanged: usize,
    /// 写入的出边集合数。
    pub edges_written: usize,
    pub deleted: usize,
    pub detached: usize,
}

impl PropagationReport {
    pub fn merge(&mut self, other: &PropagationReport) {
        self.passes += other.passes;
        self.hosts += other.hosts;
        self.created += other.created;
        self.updated += other.updated;
        self.adopted += other.adopted;
        self.unchanged += other.unchanged;
        self.edges_written += other.edges_written;
        self.deleted += other.deleted;
        self.detached += other.detached;
    }

    /// 产生写入的对象与边数量。
    pub fn writes(&self) -> usize {
        self.created
            + self.updated
            + self.adopted
            + self.edges_written
            + self.deleted
            + self.detached
    }
}
