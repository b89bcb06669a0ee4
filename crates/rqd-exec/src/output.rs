//! Output sinks for captured task stdout/stderr.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use rqd_core::{OutputSink, OutputStream};
use rqd_model::TaskId;
use tracing::{info, warn};

use crate::{ExecError, ExecResult};

/// Forwards every line to `tracing` under `rqd.exec.output`.
#[derive(Debug, Default)]
pub struct TracingOutput;

impl OutputSink for TracingOutput {
    fn on_line(&self, task_id: &TaskId, stream: OutputStream, line: &str) {
        info!(target: "rqd.exec.output", %task_id, %stream, "{line}");
    }
}

/// How many closed task ids are remembered to reject late lines.
const CLOSED_MEMORY: usize = 1024;

/// One log file per task, `<dir>/<task_id>.log`, both streams interleaved
/// in arrival order. Stderr lines are prefixed with `[stderr]`.
///
/// Lines arriving after `on_close` are dropped.
pub struct FileOutput {
    dir: PathBuf,
    files: Mutex<LogTable>,
}

#[derive(Default)]
struct LogTable {
    open: HashMap<TaskId, BufWriter<File>>,
    closed: HashSet<TaskId>,
    closed_order: VecDeque<TaskId>,
}

impl LogTable {
    fn close(&mut self, task_id: &TaskId) -> Option<BufWriter<File>> {
        if self.closed.insert(task_id.clone()) {
            self.closed_order.push_back(task_id.clone());
            if self.closed_order.len() > CLOSED_MEMORY
                && let Some(oldest) = self.closed_order.pop_front()
            {
                self.closed.remove(&oldest);
            }
        }
        self.open.remove(task_id)
    }
}

impl FileOutput {
    pub fn new(dir: impl Into<PathBuf>) -> ExecResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ExecError::LogDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            files: Mutex::new(LogTable::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log path of a task. Path separators in the id are replaced.
    pub fn path_for(&self, task_id: &TaskId) -> PathBuf {
        let name: String = task_id
            .as_str()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.log"))
    }

    fn open(&self, task_id: &TaskId) -> std::io::Result<BufWriter<File>> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(self.path_for(task_id))?;
        Ok(BufWriter::new(file))
    }
}

impl OutputSink for FileOutput {
    fn on_line(&self, task_id: &TaskId, stream: OutputStream, line: &str) {
        let mut files = self.files.lock().expect("task log table lock poisoned");
        if files.closed.contains(task_id) {
            return;
        }
        if !files.open.contains_key(task_id) {
            match self.open(task_id) {
                Ok(w) => {
                    files.open.insert(task_id.clone(), w);
                }
                Err(err) => {
                    warn!(target: "rqd.exec.output", %task_id, error = %err, "cannot open task log");
                    return;
                }
            }
        }
        let Some(writer) = files.open.get_mut(task_id) else {
            return;
        };
        let res = match stream {
            OutputStream::Stdout => writeln!(writer, "{line}"),
            OutputStream::Stderr => writeln!(writer, "[stderr] {line}"),
        };
        if let Err(err) = res {
            warn!(target: "rqd.exec.output", %task_id, error = %err, "task log write failed");
        }
    }

    fn on_close(&self, task_id: &TaskId) {
        let writer = self
            .files
            .lock()
            .expect("task log table lock poisoned")
            .close(task_id);
        if let Some(mut w) = writer
            && let Err(err) = w.flush()
        {
            warn!(target: "rqd.exec.output", %task_id, error = %err, "task log flush failed");
        }
    }
}

/// Sends every line to each inner sink.
pub struct FanOut(Vec<Arc<dyn OutputSink>>);

impl FanOut {
    pub fn new(sinks: Vec<Arc<dyn OutputSink>>) -> Self {
        Self(sinks)
    }
}

impl OutputSink for FanOut {
    fn on_line(&self, task_id: &TaskId, stream: OutputStream, line: &str) {
        for sink in &self.0 {
            sink.on_line(task_id, stream, line);
        }
    }

    fn on_close(&self, task_id: &TaskId) {
        for sink in &self.0 {
            sink.on_close(task_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rqd-output-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn file_output_writes_one_log_per_task() {
        let dir = temp_dir("files");
        let out = FileOutput::new(&dir).unwrap();
        let a = TaskId::from("job/a");
        let b = TaskId::from("b");

        out.on_line(&a, OutputStream::Stdout, "frame 1 done");
        out.on_line(&b, OutputStream::Stdout, "other");
        out.on_line(&a, OutputStream::Stderr, "warning: fallback");
        out.on_close(&a);
        out.on_close(&b);

        let log_a = fs::read_to_string(dir.join("job_a.log")).unwrap();
        assert_eq!(log_a, "frame 1 done\n[stderr] warning: fallback\n");
        assert_eq!(fs::read_to_string(out.path_for(&b)).unwrap(), "other\n");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn lines_after_close_are_dropped() {
        let dir = temp_dir("late");
        let out = FileOutput::new(&dir).unwrap();
        let id = TaskId::from("t");

        out.on_line(&id, OutputStream::Stdout, "before");
        out.on_close(&id);
        out.on_line(&id, OutputStream::Stderr, "late");
        out.on_close(&id);

        assert_eq!(fs::read_to_string(out.path_for(&id)).unwrap(), "before\n");
        assert!(out.files.lock().unwrap().open.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn closed_ids_are_forgotten_eventually() {
        let mut table = LogTable::default();
        for i in 0..CLOSED_MEMORY + 10 {
            table.close(&TaskId::from(format!("t{i}")));
        }
        assert_eq!(table.closed.len(), CLOSED_MEMORY);
        assert!(!table.closed.contains(&TaskId::from("t0")));
        assert!(table.closed.contains(&TaskId::from(format!("t{}", CLOSED_MEMORY + 9))));
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let dir_a = temp_dir("fan-a");
        let dir_b = temp_dir("fan-b");
        let a = Arc::new(FileOutput::new(&dir_a).unwrap());
        let b = Arc::new(FileOutput::new(&dir_b).unwrap());
        let fan = FanOut::new(vec![a.clone(), b.clone(), Arc::new(TracingOutput)]);

        let id = TaskId::from("t");
        fan.on_line(&id, OutputStream::Stdout, "hello");
        fan.on_close(&id);

        assert_eq!(fs::read_to_string(a.path_for(&id)).unwrap(), "hello\n");
        assert_eq!(fs::read_to_string(b.path_for(&id)).unwrap(), "hello\n");

        let _ = fs::remove_dir_all(&dir_a);
        let _ = fs::remove_dir_all(&dir_b);
    }
}
