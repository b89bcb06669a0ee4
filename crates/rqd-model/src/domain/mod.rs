mod task_id;
pub use task_id::{JobId, TaskId};

mod task_env;
pub use task_env::TaskEnv;

mod frame_range;
pub use frame_range::FrameRange;

mod assignment;
pub use assignment::TaskAssignment;

mod resources;
pub use resources::{HostResources, Reservation, ResourceSet};

mod admission;
pub use admission::{CancelOutcome, RejectReason, SubmitOutcome};

mod task_state;
pub use task_state::TaskState;

mod outcome;
pub use outcome::{ExitOutcome, TaskOutcome};

mod task_info;
pub use task_info::TaskInfo;

mod task_event;
pub use task_event::TaskEvent;

mod host_report;
pub use host_report::HostReport;

mod task_query;
pub use task_query::{TaskPage, TaskQuery};

/// Memory amount in megabytes.
pub type MemoryMb = u64;
