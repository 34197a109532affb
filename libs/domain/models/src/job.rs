//! `job_metadata` row (SPEC_FULL.md §3 entity 7, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal/running status of a job, as tracked by the job-metadata store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has started and not yet reached a terminal state.
    Running,
    /// Job completed without error.
    Success,
    /// Job terminated with an error; `exception_info` carries the text.
    Error,
}

/// One row of `job_metadata`: every invocation of every CLI subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobMetadata {
    /// Monotonic run id issued by the database on `start`.
    pub run_id: i64,
    /// Top-level CLI command, e.g. `"import"`, `"classify"`, `"listgen"`.
    pub command: String,
    /// Subcommand/list-type qualifier, e.g. `"stolen_list"`.
    pub subcommand: Option<String>,
    /// Database role the job connected as.
    pub db_user: String,
    /// The full command line the job was invoked with.
    pub command_line: String,
    /// When the job started.
    pub start_time: DateTime<Utc>,
    /// When the job reached a terminal status; `None` while running.
    pub end_time: Option<DateTime<Utc>>,
    /// Current status.
    pub status: JobStatus,
    /// Free-form structured metadata, deep-merged by `annotate`.
    pub extra_metadata: Value,
    /// Exception text, set only when `status == Error`.
    pub exception_info: Option<String>,
}

impl JobMetadata {
    /// Deep-merges `patch` into `extra_metadata`. Object keys in `patch`
    /// overwrite (and recurse into) matching keys in the existing value;
    /// non-object patches replace the whole value. Mirrors the `annotate`
    /// contract in SPEC_FULL.md §4.2: idempotent, duplicate keys overwrite.
    pub fn annotate(&mut self, patch: Value) {
        deep_merge(&mut self.extra_metadata, patch);
    }
}

fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                deep_merge(base_map.entry(key).or_insert(Value::Null), patch_value);
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JobMetadata {
        JobMetadata {
            run_id: 1,
            command: "import".to_string(),
            subcommand: Some("stolen_list".to_string()),
            db_user: "dirbs_core_import_stolen".to_string(),
            command_line: "dirbs-cli import stolen_list file.zip".to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: JobStatus::Running,
            extra_metadata: json!({}),
            exception_info: None,
        }
    }

    #[test]
    fn annotate_merges_new_keys() {
        let mut job = sample();
        job.annotate(json!({ "rows_added": 10 }));
        job.annotate(json!({ "rows_removed": 2 }));
        assert_eq!(
            job.extra_metadata,
            json!({ "rows_added": 10, "rows_removed": 2 })
        );
    }

    #[test]
    fn annotate_is_idempotent_on_duplicate_keys() {
        let mut job = sample();
        job.annotate(json!({ "rows_added": 10 }));
        job.annotate(json!({ "rows_added": 20 }));
        assert_eq!(job.extra_metadata, json!({ "rows_added": 20 }));
    }

    #[test]
    fn annotate_recurses_into_nested_objects() {
        let mut job = sample();
        job.annotate(json!({ "counters": { "add": 1, "remove": 0 } }));
        job.annotate(json!({ "counters": { "update": 3 } }));
        assert_eq!(
            job.extra_metadata,
            json!({ "counters": { "add": 1, "remove": 0, "update": 3 } })
        );
    }
}
