use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use rqd_model::{TaskId, TaskInfo, TaskPage, TaskQuery, TaskState};

/// Published snapshots of every task the runner knows about.
///
/// Each entry is written only by the monitor owning that task (plus the
/// initial insert at admission); everyone else reads clones.
#[derive(Clone, Default)]
pub struct TaskTable {
    inner: Arc<RwLock<TableInner>>,
}

#[derive(Default)]
struct TableInner {
    tasks: HashMap<TaskId, TaskInfo>,
    /// Index: job -> ids of its tasks on this host.
    by_job: HashMap<String, Vec<TaskId>>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly admitted task.
    pub fn insert(&self, info: TaskInfo) {
        let mut inner = self.inner.write().expect("task table lock poisoned");
        inner
            .by_job
            .entry(info.job_id.clone())
            .or_default()
            .push(info.task_id.clone());
        inner.tasks.insert(info.task_id.clone(), info);
    }

    /// Replace the snapshot of an existing task. Unknown ids are ignored.
    pub fn update(&self, info: TaskInfo) {
        let mut inner = self.inner.write().expect("task table lock poisoned");
        if let Some(slot) = inner.tasks.get_mut(&info.task_id) {
            *slot = info;
        }
    }

    pub fn remove(&self, id: &TaskId) -> Option<TaskInfo> {
        let mut inner = self.inner.write().expect("task table lock poisoned");
        let info = inner.tasks.remove(id)?;
        if let Some(ids) = inner.by_job.get_mut(&info.job_id) {
            ids.retain(|task_id| task_id != id);
            if ids.is_empty() {
                inner.by_job.remove(&info.job_id);
            }
        }
        Some(info)
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskInfo> {
        let inner = self.inner.read().expect("task table lock poisoned");
        inner.tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        let inner = self.inner.read().expect("task table lock poisoned");
        inner.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("task table lock poisoned").tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_all(&self) -> Vec<TaskInfo> {
        let inner = self.inner.read().expect("task table lock poisoned");
        let mut all: Vec<TaskInfo> = inner.tasks.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub fn list_by_state(&self, state: TaskState) -> Vec<TaskInfo> {
        let inner = self.inner.read().expect("task table lock poisoned");
        inner
            .tasks
            .values()
            .filter(|info| info.state == state)
            .cloned()
            .collect()
    }

    /// Query tasks with combined filters and pagination.
    ///
    /// `total` reflects the count after filtering, before pagination.
    pub fn query(&self, q: &TaskQuery) -> TaskPage<TaskInfo> {
        let inner = self.inner.read().expect("task table lock poisoned");

        let iter: Box<dyn Iterator<Item = &TaskInfo>> = match &q.job_id {
            Some(job) => match inner.by_job.get(job.as_str()) {
                Some(ids) => Box::new(ids.iter().filter_map(|id| inner.tasks.get(id))),
                None => {
                    return TaskPage {
                        items: vec![],
                        total: 0,
                    };
                }
            },
            None => Box::new(inner.tasks.values()),
        };

        let mut filtered: Vec<&TaskInfo> = match q.state {
            Some(state) => iter.filter(|info| info.state == state).collect(),
            None => iter.collect(),
        };
        filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let total = filtered.len();

        let items = filtered
            .into_iter()
            .skip(q.offset)
            .take(q.limit)
            .cloned()
            .collect();

        TaskPage { items, total }
    }
}
