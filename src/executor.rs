//! Runs generated snippets through an external interpreter.
//!
//! This is the trust boundary of the whole tool: the snippet is model output
//! the user has accepted, and it gets the interpreter's full capabilities.
//! Keeping execution behind this one seam means an allow/deny check could be
//! added here later without touching any caller.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use crate::error::ChatError;

const RUN_TIMEOUT: Duration = Duration::from_secs(120);
const OUTPUT_LIMIT: usize = 4000;

/// Captured result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stdout: String,
}

/// Executes a code string by writing it to a scratch file and handing the
/// file to the configured interpreter (`python3` by default, or
/// `blender --background --python` to drive a real scene).
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ScriptRunner {
    /// `command` is the interpreter invocation; the script path is appended
    /// as the final argument. Falls back to `python3` when empty.
    pub fn new(command: &[String]) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => ("python3".to_string(), Vec::new()),
        };
        Self {
            program,
            args,
            timeout: RUN_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self, code: &str) -> Result<RunReport, ChatError> {
        let mut script = tempfile::Builder::new()
            .prefix("blendmate-")
            .suffix(".py")
            .tempfile()
            .map_err(|e| ChatError::Execution(format!("could not stage script: {}", e)))?;
        script
            .write_all(code.as_bytes())
            .map_err(|e| ChatError::Execution(format!("could not stage script: {}", e)))?;
        script
            .flush()
            .map_err(|e| ChatError::Execution(format!("could not stage script: {}", e)))?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(&self.args)
                .arg(script.path())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match output {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();

                if output.status.success() {
                    Ok(RunReport {
                        stdout: truncate(&stdout),
                    })
                } else {
                    Err(ChatError::Execution(failure_message(&stdout, &stderr)))
                }
            }
            Ok(Err(e)) => Err(ChatError::Execution(format!(
                "could not start {}: {}",
                self.program, e
            ))),
            Err(_) => Err(ChatError::Execution(format!(
                "script timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Interpreters put the traceback on stderr; prefer its last lines, they
/// carry the exception message.
fn failure_message(stdout: &str, stderr: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    let tail: Vec<&str> = source
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    match tail.last() {
        Some(last) => truncate(last),
        None => "script exited with an error".to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.len() > OUTPUT_LIMIT {
        let mut end = OUTPUT_LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &text[..end])
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `sh` stands in for the interpreter so the tests do not depend on a
    // Python or Blender install.
    fn sh_runner() -> ScriptRunner {
        ScriptRunner::new(&["sh".to_string()])
    }

    #[tokio::test]
    async fn successful_script_reports_stdout() {
        let report = sh_runner().run("echo scene updated").await.unwrap();
        assert_eq!(report.stdout.trim(), "scene updated");
    }

    #[tokio::test]
    async fn failing_script_surfaces_the_interpreter_message() {
        let err = sh_runner()
            .run("echo 'NameError: name undefined_thing is not defined' >&2\nexit 1")
            .await
            .unwrap_err();
        match err {
            ChatError::Execution(msg) => assert!(msg.contains("undefined_thing"), "{}", msg),
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn runner_stays_usable_after_a_failure() {
        let runner = sh_runner();
        assert!(runner.run("exit 3").await.is_err());
        assert!(runner.run("true").await.is_ok());
    }

    #[tokio::test]
    async fn missing_interpreter_is_an_execution_error_not_a_crash() {
        let runner = ScriptRunner::new(&["definitely-not-an-interpreter-xyz".to_string()]);
        let err = runner.run("print(1)").await.unwrap_err();
        assert!(matches!(err, ChatError::Execution(_)));
    }

    #[tokio::test]
    async fn runaway_script_times_out() {
        let runner = sh_runner().with_timeout(Duration::from_millis(200));
        let err = runner.run("sleep 5").await.unwrap_err();
        match err {
            ChatError::Execution(msg) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[test]
    fn empty_command_falls_back_to_python() {
        let runner = ScriptRunner::new(&[]);
        assert_eq!(runner.program, "python3");
    }
}
