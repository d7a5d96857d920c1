//! Deterministic `CommandRunner` for tests.
//!
//! Responses are looked up by the full command line (`name` plus arguments
//! joined by single spaces). Unscripted commands succeed with empty output
//! unless a default failure was configured.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{CommandOutput, CommandRunner};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    Cancelled,
}

/// Mock command runner that records invocations and replays scripted output.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    commands: Mutex<Vec<Vec<String>>>,
    responses: Mutex<HashMap<String, Scripted>>,
    default_output: Mutex<Option<CommandOutput>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `name args...` with a successful exit and `stdout`.
    pub fn set_output<S: AsRef<str>>(&self, name: &str, args: &[S], stdout: &str) {
        self.script(name, args, Scripted::Output(CommandOutput::ok(stdout)));
    }

    /// Reply to `name args...` with a non-zero exit.
    pub fn set_failure<S: AsRef<str>>(&self, name: &str, args: &[S], status: i32, stderr: &str) {
        self.script(
            name,
            args,
            Scripted::Output(CommandOutput::failed(status, stderr)),
        );
    }

    /// Reply to `name args...` as if the run had been cancelled mid-flight.
    pub fn set_cancelled<S: AsRef<str>>(&self, name: &str, args: &[S]) {
        self.script(name, args, Scripted::Cancelled);
    }

    /// Reply to every unscripted command with a non-zero exit.
    pub fn set_default_failure(&self, status: i32, stderr: &str) {
        *self.default_output.lock().unwrap() = Some(CommandOutput::failed(status, stderr));
    }

    /// All invocations so far, each as `[name, args...]`.
    pub fn executed_commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }

    /// Invocations so far, each rendered as a single space-joined line.
    pub fn executed_lines(&self) -> Vec<String> {
        self.executed_commands()
            .iter()
            .map(|cmd| cmd.join(" "))
            .collect()
    }

    /// Number of invocations whose program name is `name`.
    pub fn count_invocations(&self, name: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| cmd.first().map(String::as_str) == Some(name))
            .count()
    }

    /// True if exactly `name args...` was invoked at least once.
    pub fn was_executed<S: AsRef<str>>(&self, name: &str, args: &[S]) -> bool {
        let expected = signature(name, args);
        self.executed_lines().iter().any(|line| *line == expected)
    }

    fn script<S: AsRef<str>>(&self, name: &str, args: &[S], response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert(signature(name, args), response);
    }
}

impl CommandRunner for MockCommandRunner {
    fn invoke(&self, name: &str, args: &[String]) -> Result<CommandOutput> {
        let mut cmd = vec![name.to_string()];
        cmd.extend(args.iter().cloned());
        self.commands.lock().unwrap().push(cmd);

        let key = signature(name, args);
        if let Some(response) = self.responses.lock().unwrap().get(&key) {
            return match response {
                Scripted::Output(output) => Ok(output.clone()),
                Scripted::Cancelled => Err(Error::Cancelled),
            };
        }

        Ok(self
            .default_output
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

fn signature<S: AsRef<str>>(name: &str, args: &[S]) -> String {
    std::iter::once(name)
        .chain(args.iter().map(AsRef::as_ref))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::args;

    #[test]
    fn test_unscripted_command_succeeds_empty() {
        let mock = MockCommandRunner::new();
        let output = mock.invoke("buildah", &args(["push", "x"])).unwrap();
        assert!(output.success());
        assert!(output.stdout.is_empty());
        assert_eq!(mock.executed_lines(), vec!["buildah push x"]);
    }

    #[test]
    fn test_scripted_output_and_failure() {
        let mock = MockCommandRunner::new();
        mock.set_output("skopeo", &["inspect", "docker://x"], "{}");
        mock.set_failure("buildah", &["push", "x"], 1, "denied");

        assert_eq!(
            mock.run_with_output("skopeo", &args(["inspect", "docker://x"]))
                .unwrap(),
            "{}"
        );
        assert!(mock.run("buildah", &args(["push", "x"])).is_err());
        assert_eq!(mock.count_invocations("buildah"), 1);
        assert!(mock.was_executed("skopeo", &["inspect", "docker://x"]));
    }

    #[test]
    fn test_default_failure_applies_to_unscripted_only() {
        let mock = MockCommandRunner::new();
        mock.set_default_failure(1, "nope");
        mock.set_output("git", &["rev-parse", "HEAD"], "abc\n");

        assert!(mock.run("buildah", &args(["build"])).is_err());
        assert!(mock.run("git", &args(["rev-parse", "HEAD"])).is_ok());
    }

    #[test]
    fn test_scripted_cancellation() {
        let mock = MockCommandRunner::new();
        mock.set_cancelled("buildah", &["push", "x"]);
        let err = mock.invoke("buildah", &args(["push", "x"])).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
