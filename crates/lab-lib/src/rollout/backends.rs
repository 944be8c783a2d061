//! Rollout transports
//!
//! Three backends: `print` (dry run), `ssh` (scp + remote install), and
//! `ansible` (emit inventory and playbook for an operator-driven run). All
//! report failures as stage-identifying messages so a batch report reads
//! without log spelunking.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::rollout::{RolloutBackend, RolloutHost, RolloutJob, CONFIG_FILE_NAME};

const REMOTE_STAGING_PATH: &str = "/tmp/process-sampling.yml.staged";
const AGENT_SERVICE: &str = "newrelic-infra";

/// Dry-run backend: records and echoes the commands it would run
#[derive(Debug, Default)]
pub struct PrintBackend {
    commands: Mutex<Vec<String>>,
}

impl PrintBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands recorded so far, in apply order
    pub fn commands(&self) -> Vec<String> {
        match self.commands.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RolloutBackend for PrintBackend {
    fn name(&self) -> &'static str {
        "print"
    }

    async fn apply(
        &self,
        host: &RolloutHost,
        job: &RolloutJob,
    ) -> Result<String, String> {
        let yaml = job
            .config
            .to_yaml()
            .map_err(|e| format!("render failed: {e}"))?;

        let lines = vec![
            format!("# {} <- {} bytes of configuration", host.hostname, yaml.len()),
            shell_line(&scp_command(host, "<rendered-config>")),
            shell_line(&ssh_install_command(host, true)),
        ];
        for line in &lines {
            println!("{line}");
        }
        if let Ok(mut guard) = self.commands.lock() {
            guard.extend(lines);
        }
        Ok(format!("dry run: would install {}", host.target_path()))
    }
}

/// Pushes the configuration over scp and installs it via ssh
#[derive(Debug, Clone)]
pub struct SshBackend {
    pub user: String,
    pub use_sudo: bool,
}

impl SshBackend {
    pub fn new(user: &str, use_sudo: bool) -> Self {
        Self {
            user: user.to_string(),
            use_sudo,
        }
    }

    async fn run(stage: &str, program: &str, args: &[String]) -> Result<(), String> {
        debug!(stage, program, ?args, "Running rollout command");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| format!("{stage} failed to start: {e}"))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("{stage} failed: {}", stderr.trim()))
        }
    }
}

#[async_trait]
impl RolloutBackend for SshBackend {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn apply(
        &self,
        host: &RolloutHost,
        job: &RolloutJob,
    ) -> Result<String, String> {
        let yaml = job
            .config
            .to_yaml()
            .map_err(|e| format!("render failed: {e}"))?;

        let local = std::env::temp_dir().join(format!("ilab-{}-{CONFIG_FILE_NAME}", host.hostname));
        tokio::fs::write(&local, &yaml)
            .await
            .map_err(|e| format!("staging write failed: {e}"))?;

        let scp = scp_command_for(&self.user, host, &local.to_string_lossy());
        let scp_result = Self::run("scp", &scp.0, &scp.1).await;
        let _ = tokio::fs::remove_file(&local).await;
        scp_result?;

        let ssh = ssh_install_command_for(&self.user, host, self.use_sudo);
        Self::run("ssh", &ssh.0, &ssh.1).await?;

        Ok(format!("installed {} and restarted {AGENT_SERVICE}", host.target_path()))
    }
}

/// Emits an inventory and playbook instead of touching hosts
///
/// Hosts accumulate into one inventory across the batch; the playbook and
/// configuration file are written once.
#[derive(Debug)]
pub struct AnsibleBackend {
    output_dir: PathBuf,
    hosts: Mutex<Vec<String>>,
}

impl AnsibleBackend {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            hosts: Mutex::new(Vec::new()),
        }
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.output_dir.join("inventory.ini")
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.output_dir.join("playbook.yml")
    }

    pub fn config_path(&self) -> PathBuf {
        self.output_dir.join(CONFIG_FILE_NAME)
    }

    fn playbook(job: &RolloutJob) -> String {
        let target_dir = job
            .hosts
            .first()
            .map(|h| h.target_dir.clone())
            .unwrap_or_else(|| super::DEFAULT_TARGET_DIR.to_string());
        format!(
            "---\n\
             - name: Apply ProcessSample configuration\n\
             \x20 hosts: rollout\n\
             \x20 become: true\n\
             \x20 tasks:\n\
             \x20   - name: Install drop-in configuration\n\
             \x20     ansible.builtin.copy:\n\
             \x20       src: {CONFIG_FILE_NAME}\n\
             \x20       dest: {target_dir}{CONFIG_FILE_NAME}\n\
             \x20       mode: '0644'\n\
             \x20   - name: Restart agent\n\
             \x20     ansible.builtin.service:\n\
             \x20       name: {AGENT_SERVICE}\n\
             \x20       state: restarted\n"
        )
    }
}

#[async_trait]
impl RolloutBackend for AnsibleBackend {
    fn name(&self) -> &'static str {
        "ansible"
    }

    async fn apply(
        &self,
        host: &RolloutHost,
        job: &RolloutJob,
    ) -> Result<String, String> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| format!("output dir failed: {e}"))?;

        let yaml = job
            .config
            .to_yaml()
            .map_err(|e| format!("render failed: {e}"))?;
        tokio::fs::write(self.config_path(), &yaml)
            .await
            .map_err(|e| format!("config write failed: {e}"))?;
        tokio::fs::write(self.playbook_path(), Self::playbook(job))
            .await
            .map_err(|e| format!("playbook write failed: {e}"))?;

        let inventory = {
            let mut guard = self
                .hosts
                .lock()
                .map_err(|_| "inventory state poisoned".to_string())?;
            guard.push(format!("{} ansible_port={}", host.hostname, host.ssh_port));
            let mut lines = guard.clone();
            lines.sort();
            format!("[rollout]\n{}\n", lines.join("\n"))
        };
        tokio::fs::write(self.inventory_path(), inventory)
            .await
            .map_err(|e| format!("inventory write failed: {e}"))?;

        Ok(format!("staged {} in ansible inventory", host.hostname))
    }
}

fn scp_command(host: &RolloutHost, local: &str) -> (String, Vec<String>) {
    scp_command_for("root", host, local)
}

fn scp_command_for(user: &str, host: &RolloutHost, local: &str) -> (String, Vec<String>) {
    (
        "scp".to_string(),
        vec![
            "-P".to_string(),
            host.ssh_port.to_string(),
            local.to_string(),
            format!("{user}@{}:{REMOTE_STAGING_PATH}", host.hostname),
        ],
    )
}

fn ssh_install_command(host: &RolloutHost, use_sudo: bool) -> (String, Vec<String>) {
    ssh_install_command_for("root", host, use_sudo)
}

fn ssh_install_command_for(
    user: &str,
    host: &RolloutHost,
    use_sudo: bool,
) -> (String, Vec<String>) {
    let sudo = if use_sudo { "sudo " } else { "" };
    let remote = format!(
        "{sudo}install -m 0644 {REMOTE_STAGING_PATH} {} && {sudo}systemctl restart {AGENT_SERVICE}",
        host.target_path()
    );
    (
        "ssh".to_string(),
        vec![
            "-p".to_string(),
            host.ssh_port.to_string(),
            format!("{user}@{}", host.hostname),
            remote,
        ],
    )
}

fn shell_line(command: &(String, Vec<String>)) -> String {
    let mut line = command.0.clone();
    for arg in &command.1 {
        line.push(' ');
        if arg.contains(' ') {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}
