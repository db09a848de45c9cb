//! Object store access through the MinIO client CLI (`mc`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use siasplit_av::{OutputLine, ToolCommand, ToolOutput};
use siasplit_core::config::{StorageConfig, SuccessPolicy};
use siasplit_core::{Error, Result};
use tracing::{debug, warn};

/// Operations the upload orchestrator needs from an object store.
///
/// Remote paths are relative to the registered alias, e.g.
/// `siasplit-output/<bucket>`.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Register credentials for `endpoint` under the client's alias.
    async fn register_alias(&self, endpoint: &str, access_key: &str, secret_key: &str)
        -> Result<()>;

    /// Create the bucket at `remote`.
    async fn make_bucket(&self, remote: &str) -> Result<()>;

    /// Copy the local directory `source` (and everything below it) into
    /// `remote`. The directory itself is kept as a sub-path of `remote`.
    /// Every line of transfer output is handed to `on_line`.
    async fn copy_recursive(
        &self,
        source: &Path,
        remote: &str,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<()>;

    /// Move every object under `source` to `target`, both remote.
    async fn move_recursive(&self, source: &str, target: &str) -> Result<()>;

    /// Remove the bucket at `remote` including its contents.
    async fn remove_bucket(&self, remote: &str) -> Result<()>;
}

/// [`StorageClient`] backed by the `mc` CLI.
#[derive(Debug, Clone)]
pub struct McClient {
    mc_path: PathBuf,
    alias: String,
    policy: SuccessPolicy,
    timeout: Duration,
}

impl McClient {
    pub fn new(mc_path: PathBuf, alias: impl Into<String>, policy: SuccessPolicy, timeout: Duration) -> Self {
        Self {
            mc_path,
            alias: alias.into(),
            policy,
            timeout,
        }
    }

    pub fn from_config(mc_path: PathBuf, config: &StorageConfig) -> Self {
        Self::new(
            mc_path,
            config.alias.clone(),
            config.success_policy,
            Duration::from_secs(config.step_timeout_secs),
        )
    }

    fn target(&self, remote: &str) -> String {
        format!("{}/{}", self.alias, remote.trim_start_matches('/'))
    }

    fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.mc_path.clone());
        cmd.timeout(self.timeout);
        cmd.arg("--no-color");
        cmd
    }

    async fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput> {
        let output = cmd
            .execute_streaming(|line| match line {
                OutputLine::Stdout(line) => debug!("mc: {line}"),
                OutputLine::Stderr(line) => debug!("mc stderr: {line}"),
            })
            .await?;
        judge_outcome(self.policy, &output)?;
        Ok(output)
    }
}

#[async_trait]
impl StorageClient for McClient {
    async fn register_alias(
        &self,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["alias", "set", self.alias.as_str(), endpoint])
            .secret_arg(access_key)
            .secret_arg(secret_key);

        let output = self.run(&cmd).await?;

        let marker = alias_confirmation(&self.alias);
        if !output.stdout.contains(&marker) {
            return Err(Error::tool(
                "mc",
                format!(
                    "alias registration was not confirmed: {}",
                    output.stdout.trim()
                ),
            ));
        }
        Ok(())
    }

    async fn make_bucket(&self, remote: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("mb").arg(self.target(remote));
        self.run(&cmd).await.map(|_| ())
    }

    async fn copy_recursive(
        &self,
        source: &Path,
        remote: &str,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["cp", "--recursive"])
            .arg(source.to_string_lossy().to_string())
            .arg(self.target(remote));

        let output = cmd
            .execute_streaming(|line| match line {
                OutputLine::Stdout(line) => on_line(line),
                OutputLine::Stderr(line) => debug!("mc stderr: {line}"),
            })
            .await?;
        judge_outcome(self.policy, &output)
    }

    async fn move_recursive(&self, source: &str, target: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["mv", "--recursive"])
            .arg(self.target(source))
            .arg(self.target(target));
        self.run(&cmd).await.map(|_| ())
    }

    async fn remove_bucket(&self, remote: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["rb", "--force"]).arg(self.target(remote));
        self.run(&cmd).await.map(|_| ())
    }
}

/// Line `mc alias set` prints when the alias was stored.
pub fn alias_confirmation(alias: &str) -> String {
    format!("Added `{alias}` successfully.")
}

/// Decide whether an `mc` invocation succeeded under `policy`.
pub fn judge_outcome(policy: SuccessPolicy, output: &ToolOutput) -> Result<()> {
    let stderr = output.stderr.trim();
    match policy {
        SuccessPolicy::Stderr => {
            if !stderr.is_empty() {
                return Err(Error::tool("mc", stderr));
            }
            if !output.status.success() {
                warn!("mc exited with {} but wrote nothing to stderr", output.status);
            }
            Ok(())
        }
        SuccessPolicy::ExitCode => {
            if !output.status.success() {
                let message = if stderr.is_empty() {
                    format!("exited with status {}", output.status)
                } else {
                    format!("exited with status {}: {stderr}", output.status)
                };
                return Err(Error::tool("mc", message));
            }
            if !stderr.is_empty() {
                warn!("mc succeeded with stderr output: {stderr}");
            }
            Ok(())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stdout: &str, stderr: &str) -> ToolOutput {
        ToolOutput {
            // Wait status encodes the exit code in the high byte.
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn stderr_policy_fails_on_stderr_even_with_zero_exit() {
        let result = judge_outcome(SuccessPolicy::Stderr, &output(0, "", "mc: <ERROR> nope\n"));
        assert_matches!(result, Err(Error::Tool { message, .. }) if message == "mc: <ERROR> nope");
    }

    #[test]
    fn stderr_policy_accepts_silent_non_zero_exit() {
        assert!(judge_outcome(SuccessPolicy::Stderr, &output(1, "done\n", "")).is_ok());
    }

    #[test]
    fn exit_code_policy_ignores_stderr_noise() {
        assert!(judge_outcome(SuccessPolicy::ExitCode, &output(0, "", "warning\n")).is_ok());
    }

    #[test]
    fn exit_code_policy_fails_on_non_zero_exit() {
        let result = judge_outcome(SuccessPolicy::ExitCode, &output(1, "", "bucket exists\n"));
        assert_matches!(result, Err(Error::Tool { message, .. }) if message.contains("bucket exists"));
    }

    #[test]
    fn confirmation_marker_names_alias() {
        assert_eq!(alias_confirmation("renterd"), "Added `renterd` successfully.");
    }

    #[test]
    fn remote_targets_are_prefixed_with_alias() {
        let client = McClient::new(
            PathBuf::from("mc"),
            "renterd",
            SuccessPolicy::Stderr,
            Duration::from_secs(5),
        );
        assert_eq!(client.target("siasplit-output/abc"), "renterd/siasplit-output/abc");
        assert_eq!(client.target("/siasplit-output"), "renterd/siasplit-output");
    }

    /// Write an executable `mc` stand-in that appends its arguments to
    /// `args.log` next to it, then runs `body`.
    fn fake_mc(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("mc");
        let log = dir.join("args.log");
        let script = format!("#!/bin/sh\necho \"$@\" >> '{}'\n{body}\n", log.display());
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn logged_args(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("args.log"))
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    fn client(mc: PathBuf) -> McClient {
        McClient::new(mc, "renterd", SuccessPolicy::Stderr, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn alias_without_confirmation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mc = client(fake_mc(dir.path(), "echo hello"));

        let result = mc
            .register_alias("http://localhost:9885", "access", "secret")
            .await;

        assert_matches!(
            result,
            Err(Error::Tool { message, .. }) if message == "alias registration was not confirmed: hello"
        );
    }

    #[tokio::test]
    async fn alias_with_confirmation_passes_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mc = client(fake_mc(dir.path(), "echo 'Added `renterd` successfully.'"));

        mc.register_alias("http://localhost:9885", "access", "secret")
            .await
            .unwrap();

        assert_eq!(
            logged_args(dir.path()),
            ["--no-color alias set renterd http://localhost:9885 access secret"]
        );
    }

    #[tokio::test]
    async fn copy_forwards_stdout_and_fails_on_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let mc = client(fake_mc(dir.path(), "echo 'x.ts -> y'\necho warn >&2"));
        let source = dir.path().join("output");

        let mut lines = Vec::new();
        let result = mc
            .copy_recursive(&source, "siasplit-output/b", &mut |line: &str| {
                lines.push(line.to_string())
            })
            .await;

        assert_matches!(result, Err(Error::Tool { message, .. }) if message == "warn");
        assert_eq!(lines, ["x.ts -> y"]);
        assert_eq!(
            logged_args(dir.path()),
            [format!(
                "--no-color cp --recursive {} renterd/siasplit-output/b",
                source.display()
            )]
        );
    }

    #[tokio::test]
    async fn bucket_commands_target_the_alias() {
        let dir = tempfile::tempdir().unwrap();
        let mc = client(fake_mc(dir.path(), "echo ok"));

        mc.make_bucket("siasplit-output/b").await.unwrap();
        mc.move_recursive("siasplit-output/b/output/", "siasplit-output/b")
            .await
            .unwrap();
        mc.remove_bucket("siasplit-output/b").await.unwrap();

        assert_eq!(
            logged_args(dir.path()),
            [
                "--no-color mb renterd/siasplit-output/b",
                "--no-color mv --recursive renterd/siasplit-output/b/output/ renterd/siasplit-output/b",
                "--no-color rb --force renterd/siasplit-output/b",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_tool_error() {
        let client = McClient::new(
            PathBuf::from("nonexistent_mc_xyz_12345"),
            "renterd",
            SuccessPolicy::Stderr,
            Duration::from_secs(5),
        );
        let result = client.make_bucket("siasplit-output/abc").await;
        assert_matches!(result, Err(Error::Tool { .. }));
    }
}
