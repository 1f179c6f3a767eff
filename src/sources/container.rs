//! Reading files out of running containers through the `docker` CLI.
//!
//! Mirrors [`super::session`]: one `docker exec` per operation, `cat` output
//! materialized into a temp file, `ls` output split into paths.

use std::process::{Command, Stdio};

use super::session::{SessionError, cat_command, split_listing};
use crate::tempfiles::MaterializedFile;

/// Binary used to reach the container runtime.
pub const DOCKER_BIN: &str = "docker";

fn docker_exec(container_id: &str, shell_command: &str) -> Command {
    let mut cmd = Command::new(DOCKER_BIN);
    cmd.args(["exec", container_id, "sh", "-c", shell_command])
        .stdin(Stdio::null());
    cmd
}

fn run(container_id: &str, shell_command: &str, stdout: Stdio) -> Result<String, SessionError> {
    let output = docker_exec(container_id, shell_command)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| SessionError::Connection {
            address: format!("docker:{container_id}"),
            source,
        })?;

    if !output.status.success() {
        return Err(SessionError::CommandFailed {
            command: shell_command.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Copy a file out of `container_id` into a fresh local temp file.
pub fn read_file(container_id: &str, path: &str) -> Result<MaterializedFile, SessionError> {
    let mut file = MaterializedFile::new()?;
    let sink = file.writer().try_clone()?;
    run(container_id, &cat_command(path), Stdio::from(sink))?;
    Ok(file)
}

/// List files inside `container_id` matching `pattern`.
pub fn list_files(container_id: &str, pattern: &str) -> Result<Vec<String>, SessionError> {
    let stdout = run(container_id, &format!("ls {pattern}"), Stdio::piped())?;
    Ok(split_listing(&stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_exec_arguments() {
        let cmd = docker_exec("abc123", "ls /var/log/*.log");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), DOCKER_BIN);
        assert_eq!(args, vec!["exec", "abc123", "sh", "-c", "ls /var/log/*.log"]);
    }
}
