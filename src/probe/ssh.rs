//! SSH transport for `ping`
//!
//! Connects to the source node's public address and runs `ping` against the
//! target's private address. The SSH client process is spawned with
//! `kill_on_drop`, so dropping the probe future (budget exceeded) terminates it.

use super::ping::parse_ping_output;
use super::{Probe, ProbeError, ProbeOutput};
use crate::inventory::Node;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// SSH exits with this status when the connection itself failed
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Bytes of stderr kept in transport error messages
const STDERR_EXCERPT: usize = 200;

/// Resolves the login user for a node's cloud
pub trait UserLookup: Send + Sync {
    fn user_for(&self, cloud: &str) -> String;
}

/// Login users: explicit override, then per-cloud table, then fallback
#[derive(Debug, Clone)]
pub struct SshUsers {
    pub override_user: Option<String>,
    pub per_cloud: BTreeMap<String, String>,
    pub fallback: String,
}

impl Default for SshUsers {
    fn default() -> Self {
        Self {
            override_user: None,
            per_cloud: default_users(),
            fallback: "ec2-user".to_string(),
        }
    }
}

/// Default login user per cloud image
pub fn default_users() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("aws".to_string(), "ec2-user".to_string()),
        ("azure".to_string(), "azureuser".to_string()),
    ])
}

impl UserLookup for SshUsers {
    fn user_for(&self, cloud: &str) -> String {
        if let Some(ref user) = self.override_user {
            return user.clone();
        }
        self.per_cloud
            .get(cloud)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Ping parameters sent to the source node
#[derive(Debug, Clone, PartialEq)]
pub struct PingOptions {
    /// Packets per measurement
    pub count: u32,
    /// Seconds between packets
    pub interval_secs: f64,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            count: 100,
            interval_secs: 0.2,
        }
    }
}

/// Runs `ping` on the source node over SSH
pub struct SshProbe {
    key: PathBuf,
    users: Box<dyn UserLookup>,
    ping: PingOptions,
    connect_timeout: Duration,
}

impl SshProbe {
    pub fn new(
        key: PathBuf,
        users: impl UserLookup + 'static,
        ping: PingOptions,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            key,
            users: Box::new(users),
            ping,
            connect_timeout,
        }
    }

    /// Remote command executed on the source node
    pub fn remote_command(&self, target: &Node) -> String {
        format!(
            "ping -c {} -i {} {}",
            self.ping.count, self.ping.interval_secs, target.target_address
        )
    }

    /// Full `ssh` argument list for a source/target pair
    pub fn ssh_args(&self, source: &Node, target: &Node) -> Vec<String> {
        let user = self.users.user_for(&source.cloud);
        vec![
            "-i".to_string(),
            self.key.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            format!("{}@{}", user, source.connect_address),
            self.remote_command(target),
        ]
    }
}

#[async_trait]
impl Probe for SshProbe {
    fn name(&self) -> &str {
        "ssh-ping"
    }

    async fn probe(
        &self,
        source: &Node,
        target: &Node,
        _budget: Duration,
    ) -> Result<ProbeOutput, ProbeError> {
        let output = Command::new("ssh")
            .args(self.ssh_args(source, target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.code() == Some(SSH_CONNECTION_FAILURE) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(ProbeError::Transport(format!(
                "ssh to {} failed: {}",
                source.connect_address, excerpt
            )));
        }

        // ping exits non-zero on partial loss; the text still carries the stats
        Ok(parse_remote_output(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

/// Parse stdout, keeping stderr as raw text when stdout has nothing usable
fn parse_remote_output(stdout: &str, stderr: &str) -> ProbeOutput {
    let mut parsed = parse_ping_output(stdout);
    let usable = !parsed.samples.is_empty() || parsed.reported.is_some();
    if !usable && !stderr.trim().is_empty() {
        if !parsed.raw_text.is_empty() && !parsed.raw_text.ends_with('\n') {
            parsed.raw_text.push('\n');
        }
        parsed.raw_text.push_str(stderr);
    }
    parsed
}
