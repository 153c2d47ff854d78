use archive_model::StitcherError;
use tokio::process::Command;
use tracing::debug;

/// Runs an external tool to completion and returns stdout and stderr
/// merged into one string, mirroring `subprocess.check_output(...,
/// stderr=subprocess.STDOUT)` in the Python original — `sox stat` writes
/// its measurements to stderr, so callers need both streams together.
pub async fn run_tool(path: &str, args: &[&str]) -> Result<String, StitcherError> {
    debug!(tool = path, ?args, "running external tool");
    let output = Command::new(path).args(args).output().await?;

    let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
    merged.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(StitcherError::ToolFailed {
            tool: path.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(merged)
}
