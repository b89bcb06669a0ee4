//! Frame tokens and `CUE_*` variables handed to render wrappers.
//!
//! Wrappers read the chunk they must render either from substituted command
//! tokens (`-s #FRAME_START# -e #FRAME_END#`) or from the environment
//! (`CUE_IFRAME`, `CUE_CHUNK`).
use rqd_model::{TaskAssignment, TaskEnv};

/// Replace frame and identity tokens in one argument.
pub fn expand_tokens(arg: &str, assignment: &TaskAssignment) -> String {
    if !arg.contains('#') {
        return arg.to_string();
    }
    let range = &assignment.frame_range;
    arg.replace("#IFRAME#", &range.start.to_string())
        .replace("#FRAME_START#", &range.start.to_string())
        .replace("#FRAME_END#", &range.end.to_string())
        .replace("#FRAME_CHUNK#", &range.chunk_size.to_string())
        .replace("#ZFRAME#", &zero_padded(range.start))
        .replace("#JOB#", &assignment.job_id)
        .replace("#TASK#", assignment.task_id.as_str())
}

/// Four-digit frame number; the sign stays in front of the padding.
fn zero_padded(frame: i64) -> String {
    if frame < 0 {
        format!("-{:04}", frame.unsigned_abs())
    } else {
        format!("{frame:04}")
    }
}

/// Expand tokens in the whole argument vector.
pub fn expand_command(assignment: &TaskAssignment) -> Vec<String> {
    assignment
        .command
        .iter()
        .map(|arg| expand_tokens(arg, assignment))
        .collect()
}

/// `CUE_*` variables describing the task.
pub fn cue_env(assignment: &TaskAssignment) -> TaskEnv {
    let range = &assignment.frame_range;
    let mut env = TaskEnv::new();
    env.insert("CUE_IFRAME", range.start.to_string());
    env.insert("CUE_FRAME_START", range.start.to_string());
    env.insert("CUE_FRAME_END", range.end.to_string());
    env.insert("CUE_CHUNK", range.chunk_size.to_string());
    env.insert("CUE_JOB", assignment.job_id.clone());
    env.insert("CUE_TASK", assignment.task_id.to_string());
    env.insert("CUE_THREADS", assignment.cores_requested.to_string());
    env.insert("CUE_MEMORY", assignment.memory_requested.to_string());
    env.insert("CUE_GPUS", assignment.gpus_requested.to_string());
    env
}

/// Final environment: base < `CUE_*` < assignment.
pub fn task_env(base: &TaskEnv, assignment: &TaskAssignment) -> TaskEnv {
    base.merged(&cue_env(assignment))
        .merged(&assignment.environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rqd_model::FrameRange;

    fn blender() -> TaskAssignment {
        TaskAssignment::new(
            "t-0001",
            "shot010-lighting",
            vec![
                "blender".into(),
                "-b".into(),
                "scene.blend".into(),
                "-s".into(),
                "#FRAME_START#".into(),
                "-e".into(),
                "#FRAME_END#".into(),
                "-o".into(),
                "/out/#JOB#.#ZFRAME#".into(),
                "-a".into(),
            ],
            4,
            4096,
        )
        .with_frame_range(FrameRange::new(11, 15, 5))
    }

    #[test]
    fn zframe_pads_the_magnitude() {
        assert_eq!(zero_padded(7), "0007");
        assert_eq!(zero_padded(12345), "12345");
        assert_eq!(zero_padded(-5), "-0005");
        assert_eq!(zero_padded(0), "0000");
    }

    #[test]
    fn substitutes_frame_tokens() {
        let cmd = expand_command(&blender());
        assert_eq!(cmd[4], "11");
        assert_eq!(cmd[6], "15");
        assert_eq!(cmd[8], "/out/shot010-lighting.0011");
        assert_eq!(cmd[0], "blender");
    }

    #[test]
    fn plain_arguments_are_untouched() {
        assert_eq!(expand_tokens("--use-compositing", &blender()), "--use-compositing");
        assert_eq!(expand_tokens("#UNKNOWN#", &blender()), "#UNKNOWN#");
    }

    #[test]
    fn cue_variables_describe_chunk() {
        let env = cue_env(&blender());
        assert_eq!(env.get("CUE_IFRAME"), Some("11"));
        assert_eq!(env.get("CUE_CHUNK"), Some("5"));
        assert_eq!(env.get("CUE_FRAME_END"), Some("15"));
        assert_eq!(env.get("CUE_THREADS"), Some("4"));
        assert_eq!(env.get("CUE_JOB"), Some("shot010-lighting"));
    }

    #[test]
    fn assignment_env_wins() {
        let base = TaskEnv::single("CUE_THREADS", "1");
        let a = blender().with_env("CUE_THREADS", "2");
        let env = task_env(&base, &a);
        assert_eq!(env.get("CUE_THREADS"), Some("2"));

        let env = task_env(&base, &blender());
        assert_eq!(env.get("CUE_THREADS"), Some("4"));
    }
}
