//! Commit-and-poll engine: upload a solution at most once per distinct
//! content, then poll until the grading worker publishes a result.
//!
//! Per invocation the engine moves through
//! `HASHING -> {UNCHANGED, UPLOADING} -> POLLING -> {DONE, TIMED_OUT}`.
//! Re-committing byte-identical content never re-uploads, and never even
//! touches the network when a result is already cached.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::api::Transport;
use crate::config::ConfigState;
use crate::error::TstError;
use crate::key::AssignmentKey;
use crate::ui;
use crate::workspace::WorkspaceState;

/// Failed poll attempts tolerated before the worker is declared down.
const MAX_POLL_RETRIES: u32 = 8;
/// Longest pause between poll attempts, in seconds.
const MAX_POLL_DELAY: u64 = 60;

/// Seconds to wait before poll retry `retry` (0-based): 2, 4, 8, 16, 32,
/// then capped.
fn backoff_delay(retry: u32) -> u64 {
    (2u64 << retry).min(MAX_POLL_DELAY)
}

/// How far the server's activity revision has drifted from the local copy.
/// Only the warning wording depends on this, never control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevisionDrift {
    Major,
    Minor,
}

/// Component-wise comparison of `major.minor.patch` strings. `None` when
/// the revisions are equal.
fn classify_drift(local: &str, online: &str) -> Option<RevisionDrift> {
    fn major(revision: &str) -> &str {
        revision.split('.').next().unwrap_or(revision)
    }
    if local == online {
        return None;
    }
    if major(local) != major(online) {
        Some(RevisionDrift::Major)
    } else {
        Some(RevisionDrift::Minor)
    }
}

/// Wire form of one grading result: a bare summary string or a structured
/// record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResult {
    Plain(String),
    Detailed {
        summary: String,
        #[serde(default)]
        feedback: String,
    },
}

/// Canonical result shape both wire forms normalize to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingResult {
    pub summary: String,
    pub feedback: String,
}

/// Interpret one entry of the results map. `None` while the worker has not
/// produced anything (null, empty string, empty object).
fn parse_result(value: &Value) -> Option<GradingResult> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Object(m) if m.is_empty() => None,
        other => serde_json::from_value::<RawResult>(other.clone())
            .ok()
            .map(|raw| match raw {
                RawResult::Plain(summary) => GradingResult {
                    summary,
                    feedback: String::new(),
                },
                RawResult::Detailed { summary, feedback } => {
                    GradingResult { summary, feedback }
                }
            }),
    }
}

fn assignment_url(base: &str, key: AssignmentKey) -> String {
    format!("{}/api/assignment/{}", base, key.decimal())
}

fn results_url(base: &str, key: AssignmentKey) -> String {
    format!("{}/api/results/{}", base, key.decimal())
}

fn report(filename: &str, result: &GradingResult) {
    println!("[{}] {}", filename, result.summary);
    if !result.feedback.is_empty() {
        println!("{}", result.feedback);
    }
}

/// A previously stored result for this hash, if any commit ever recorded one.
fn cached_result(workspace: &WorkspaceState, hash: &str) -> Option<GradingResult> {
    let record = workspace.commits.get(hash)?;
    let summary = record.summary.clone().filter(|s| !s.is_empty())?;
    Some(GradingResult {
        summary,
        feedback: record.feedback.clone().unwrap_or_default(),
    })
}

pub fn run(
    config: &ConfigState,
    transport: &dyn Transport,
    dir: &Path,
    filename_arg: Option<&str>,
    sleep: &mut dyn FnMut(Duration),
) -> Result<(), TstError> {
    let workspace = WorkspaceState::load(dir)?;
    let key = match &workspace.key {
        Some(hex) => {
            AssignmentKey::from_hex(hex).map_err(|_| TstError::WorkspaceKeyMissing)?
        }
        None => return Err(TstError::WorkspaceKeyMissing),
    };
    let filename = filename_arg
        .map(str::to_string)
        .or_else(|| workspace.filename.clone())
        .ok_or(TstError::MissingFilename)?;
    let path = dir.join(&filename);
    if !path.exists() {
        return Err(TstError::SubmissionMissing(filename));
    }
    let code = std::fs::read_to_string(&path)?;
    let hash = format!("{:x}", md5::compute(code.as_bytes()));
    debug!(%filename, %hash, "hashed submission");

    let mut engine = Engine {
        config,
        transport,
        dir,
        key,
        workspace,
    };

    if engine.workspace.last_commit.as_deref() == Some(hash.as_str()) {
        println!("WARNING: no changes in '{filename}' since last commit!");
        println!("WARNING: No commit performed.");
        if let Some(result) = cached_result(&engine.workspace, &hash) {
            // deliberate shortcut: cached result, zero network calls
            println!("Previous results:");
            report(&filename, &result);
            return Ok(());
        }
        // uploaded before but never graded: resume polling, no re-upload
        println!("No previous results.");
    } else {
        engine.upload(&filename, &code, &hash)?;
    }

    let result = engine.poll(&hash, sleep)?;
    report(&filename, &result);
    Ok(())
}

struct Engine<'a> {
    config: &'a ConfigState,
    transport: &'a dyn Transport,
    dir: &'a Path,
    key: AssignmentKey,
    workspace: WorkspaceState,
}

impl Engine<'_> {
    /// Send the submission as a JSON-Patch append to the answers list and
    /// record the server-issued grading timestamp. State is only persisted
    /// on a 200; any rejection leaves `tst.json` untouched.
    fn upload(&mut self, filename: &str, code: &str, hash: &str) -> Result<(), TstError> {
        let local_revision = self
            .workspace
            .activity_revision
            .clone()
            .unwrap_or_else(|| "1.0.0".to_string());
        let payload = json!([{
            "op": "add",
            "path": "/answers",
            "value": {
                "__code": code,
                "__filename": filename,
                "__activity_revision": local_revision,
            }
        }]);

        println!("Uploading file '{}' (key: {})...", filename, self.key);
        let spinner = ui::spinner("Uploading...");
        let response = self
            .transport
            .patch(&assignment_url(&self.config.url, self.key), &payload);
        spinner.finish_and_clear();
        let response = response?;

        if response.status == 412 {
            return Err(TstError::PreconditionFailed {
                message: response.first_message(),
            });
        }
        if response.status != 200 {
            return Err(TstError::Unauthorized(response.status));
        }

        let body = response.json()?;
        let timestamp = body
            .get("answers")
            .and_then(Value::as_array)
            .and_then(|answers| answers.last())
            .and_then(|answer| answer.get("__timestamp"))
            .and_then(Value::as_str)
            .ok_or_else(|| TstError::BadResponse("missing answer timestamp".into()))?
            .to_string();

        if let Some(online_revision) = body.get("activity_revision").and_then(Value::as_str) {
            warn_on_drift(&local_revision, online_revision);
        }

        println!("Upload completed at '{timestamp}' (UTC)");
        self.workspace.record_upload(hash, timestamp);
        self.workspace.save(self.dir)?;
        Ok(())
    }

    /// Poll the results endpoint until this hash's grading timestamp shows a
    /// result, sleeping on the backoff schedule between attempts. Non-200
    /// responses count as failed attempts and are retried; network errors
    /// abort immediately.
    fn poll(
        &mut self,
        hash: &str,
        sleep: &mut dyn FnMut(Duration),
    ) -> Result<GradingResult, TstError> {
        let timestamp = self
            .workspace
            .commits
            .get(hash)
            .and_then(|record| record.timestamp.clone());
        let url = results_url(&self.config.url, self.key);
        let mut retries: u32 = 0;
        loop {
            println!("Checking server for results...");
            let response = self.transport.get(&url)?;
            if response.status == 200 {
                if let Ok(results) = response.json() {
                    let found = timestamp
                        .as_deref()
                        .and_then(|ts| results.get(ts))
                        .and_then(parse_result);
                    if let Some(result) = found {
                        self.workspace.record_result(
                            hash,
                            result.summary.clone(),
                            result.feedback.clone(),
                        );
                        self.workspace.save(self.dir)?;
                        return Ok(result);
                    }
                }
            } else {
                debug!(status = response.status, "results endpoint unavailable");
            }

            retries += 1;
            if retries > MAX_POLL_RETRIES {
                return Err(TstError::PollTimeout);
            }
            let delay = backoff_delay(retries - 1);
            println!("Will check again in {delay} seconds.");
            sleep(Duration::from_secs(delay));
        }
    }
}

fn warn_on_drift(local: &str, online: &str) {
    let Some(drift) = classify_drift(local, online) else {
        return;
    };
    match drift {
        RevisionDrift::Major => {
            println!("WARNING: A MAJOR revision of this activity has been issued.");
        }
        RevisionDrift::Minor => {
            println!("WARNING: A MINOR revision of this activity has been issued.");
        }
    }
    println!("WARNING: You SHOULD renew your copy and update your files.");
    println!("WARNING: - local revision: {local}");
    println!("WARNING: - online revision: {online}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTransport;
    use crate::workspace::CommitRecord;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> ConfigState {
        ConfigState {
            url: "http://tst.test".into(),
            access_token: "tok".into(),
            email: "alice@example.org".into(),
        }
    }

    fn md5_hex(contents: &str) -> String {
        format!("{:x}", md5::compute(contents))
    }

    fn workspace(key: &str, filename: &str) -> WorkspaceState {
        WorkspaceState {
            key: Some(key.into()),
            activity_revision: Some("1.0.0".into()),
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    #[test]
    fn backoff_schedule_doubles_then_caps() {
        let delays: Vec<u64> = (0..9).map(backoff_delay).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 60, 60, 60, 60]);
    }

    #[test]
    fn revision_drift_classification() {
        assert_eq!(classify_drift("1.0.0", "1.0.1"), Some(RevisionDrift::Minor));
        assert_eq!(classify_drift("1.0.0", "1.2.0"), Some(RevisionDrift::Minor));
        assert_eq!(classify_drift("1.0.0", "2.0.0"), Some(RevisionDrift::Major));
        assert_eq!(classify_drift("1.0.0", "1.0.0"), None);
    }

    #[test]
    fn result_normalization_accepts_both_wire_forms() {
        assert_eq!(
            parse_result(&json!("OK")),
            Some(GradingResult {
                summary: "OK".into(),
                feedback: String::new(),
            })
        );
        assert_eq!(
            parse_result(&json!({"summary": "PASS", "feedback": "well done"})),
            Some(GradingResult {
                summary: "PASS".into(),
                feedback: "well done".into(),
            })
        );
        assert_eq!(parse_result(&json!({"summary": "PASS"})).unwrap().feedback, "");
    }

    #[test]
    fn pending_results_are_not_results() {
        assert_eq!(parse_result(&Value::Null), None);
        assert_eq!(parse_result(&json!("")), None);
        assert_eq!(parse_result(&json!({})), None);
    }

    #[test]
    fn unchanged_submission_with_cached_result_makes_no_requests() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(1)\n").unwrap();
        let hash = md5_hex("print(1)\n");
        let mut state = workspace("1A2", "sol.py");
        state.last_commit = Some(hash.clone());
        state.commits.insert(
            hash,
            CommitRecord {
                timestamp: Some("t0".into()),
                summary: Some("OK".into()),
                feedback: Some(String::new()),
            },
        );
        state.save(dir.path()).unwrap();

        let transport = StubTransport::new(vec![]);
        run(&config(), &transport, dir.path(), None, &mut |_| {}).unwrap();
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn upload_then_poll_records_result() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(2)\n").unwrap();
        workspace("1A2", "sol.py").save(dir.path()).unwrap();

        let patch_body = json!({
            "answers": [{"__timestamp": "2026-01-01 00:00:00"}],
            "activity_revision": "1.0.0",
        })
        .to_string();
        let results_body =
            json!({"2026-01-01 00:00:00": {"summary": "PASS", "feedback": "nice"}}).to_string();
        let transport = StubTransport::new(vec![
            StubTransport::ok(&patch_body),
            StubTransport::ok(&results_body),
        ]);

        let mut sleeps = Vec::new();
        run(&config(), &transport, dir.path(), None, &mut |d| {
            sleeps.push(d.as_secs())
        })
        .unwrap();

        let calls = transport.calls.borrow();
        assert_eq!(
            *calls,
            vec![
                "PATCH http://tst.test/api/assignment/418".to_string(),
                "GET http://tst.test/api/results/418".to_string(),
            ]
        );
        assert!(sleeps.is_empty());

        let payload = &transport.patch_payloads.borrow()[0];
        assert_eq!(payload[0]["op"], "add");
        assert_eq!(payload[0]["path"], "/answers");
        assert_eq!(payload[0]["value"]["__filename"], "sol.py");
        assert_eq!(payload[0]["value"]["__activity_revision"], "1.0.0");

        let state = WorkspaceState::load(dir.path()).unwrap();
        let hash = md5_hex("print(2)\n");
        assert_eq!(state.last_commit.as_deref(), Some(hash.as_str()));
        let record = &state.commits[&hash];
        assert_eq!(record.timestamp.as_deref(), Some("2026-01-01 00:00:00"));
        assert_eq!(record.summary.as_deref(), Some("PASS"));
        assert_eq!(record.feedback.as_deref(), Some("nice"));
    }

    #[test]
    fn second_commit_of_same_content_replays_cached_result() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(2)\n").unwrap();
        workspace("1A2", "sol.py").save(dir.path()).unwrap();

        let patch_body =
            json!({"answers": [{"__timestamp": "t1"}], "activity_revision": "1.0.0"}).to_string();
        let results_body = json!({"t1": "OK"}).to_string();
        let first = StubTransport::new(vec![
            StubTransport::ok(&patch_body),
            StubTransport::ok(&results_body),
        ]);
        run(&config(), &first, dir.path(), None, &mut |_| {}).unwrap();
        assert_eq!(first.request_count(), 2);

        // identical content again: exactly zero further requests
        let second = StubTransport::new(vec![]);
        run(&config(), &second, dir.path(), None, &mut |_| {}).unwrap();
        assert_eq!(second.request_count(), 0);
    }

    #[test]
    fn unchanged_without_result_resumes_polling_without_upload() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(3)\n").unwrap();
        let hash = md5_hex("print(3)\n");
        let mut state = workspace("1A2", "sol.py");
        state.last_commit = Some(hash.clone());
        state.commits.insert(
            hash.clone(),
            CommitRecord {
                timestamp: Some("t7".into()),
                summary: None,
                feedback: None,
            },
        );
        state.save(dir.path()).unwrap();

        let transport = StubTransport::new(vec![StubTransport::ok(
            &json!({"t7": "ACCEPTED"}).to_string(),
        )]);
        run(&config(), &transport, dir.path(), None, &mut |_| {}).unwrap();

        let calls = transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("GET"));

        let state = WorkspaceState::load(dir.path()).unwrap();
        assert_eq!(state.commits[&hash].summary.as_deref(), Some("ACCEPTED"));
    }

    #[test]
    fn precondition_failure_leaves_workspace_untouched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(4)\n").unwrap();
        workspace("1A2", "sol.py").save(dir.path()).unwrap();
        let before = fs::read_to_string(dir.path().join("tst.json")).unwrap();

        let body = json!({"messages": ["Deadline passed"]}).to_string();
        let transport = StubTransport::new(vec![StubTransport::status(412, &body)]);
        let err = run(&config(), &transport, dir.path(), None, &mut |_| {}).unwrap_err();

        match err {
            TstError::PreconditionFailed { message } => assert_eq!(message, "Deadline passed"),
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("tst.json")).unwrap(),
            before
        );
    }

    #[test]
    fn other_upload_failures_read_as_not_logged_in() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(5)\n").unwrap();
        workspace("1A2", "sol.py").save(dir.path()).unwrap();

        let transport = StubTransport::new(vec![StubTransport::status(500, "")]);
        let err = run(&config(), &transport, dir.path(), None, &mut |_| {}).unwrap_err();
        assert!(matches!(err, TstError::Unauthorized(500)));
    }

    #[test]
    fn poll_budget_exhausts_after_nine_attempts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sol.py"), "print(6)\n").unwrap();
        let hash = md5_hex("print(6)\n");
        let mut state = workspace("1A2", "sol.py");
        state.last_commit = Some(hash.clone());
        state.commits.insert(
            hash.clone(),
            CommitRecord {
                timestamp: Some("t9".into()),
                summary: None,
                feedback: None,
            },
        );
        state.save(dir.path()).unwrap();

        // empty results forever
        let transport = StubTransport::new(vec![StubTransport::ok("{}")]);
        let mut sleeps = Vec::new();
        let err = run(&config(), &transport, dir.path(), None, &mut |d| {
            sleeps.push(d.as_secs())
        })
        .unwrap_err();

        assert!(matches!(err, TstError::PollTimeout));
        assert_eq!(transport.request_count(), 9);
        assert!(transport.calls.borrow().iter().all(|c| c.starts_with("GET")));
        assert_eq!(sleeps, vec![2, 4, 8, 16, 32, 60, 60, 60]);

        // no fabricated result was persisted
        let state = WorkspaceState::load(dir.path()).unwrap();
        assert_eq!(state.commits[&hash].summary, None);
    }

    #[test]
    fn missing_filename_and_missing_file_are_fatal() {
        let dir = TempDir::new().unwrap();
        let mut state = workspace("1A2", "sol.py");
        state.filename = None;
        state.save(dir.path()).unwrap();

        let transport = StubTransport::new(vec![]);
        let err = run(&config(), &transport, dir.path(), None, &mut |_| {}).unwrap_err();
        assert!(matches!(err, TstError::MissingFilename));

        let err = run(&config(), &transport, dir.path(), Some("ghost.py"), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, TstError::SubmissionMissing(name) if name == "ghost.py"));
    }
}
