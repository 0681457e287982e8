#![allow(dead_code)]

use async_trait::async_trait;
use kubegate::config::{CliToolDescriptor, GatewayConfig};
use kubegate::{Gateway, ToolProbe};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Local binaries standing in for cluster CLIs
pub fn local_tools() -> Vec<CliToolDescriptor> {
    let mut echo = CliToolDescriptor::new("echo", "echo", "echo ok");
    // GNU and BSD echo disagree on --help, so help is echoed back instead
    echo.help_flag = "usage".to_string();

    vec![
        echo,
        CliToolDescriptor::new("sh", "sh", "sh -c true")
            .with_auth_hint("Run 'sh login' to refresh your session."),
        CliToolDescriptor::new("sleep", "sleep", "sleep 0"),
        CliToolDescriptor::new("ghost", "kubegate-ghost", "kubegate-ghost version"),
    ]
}

/// Config using only local tools, with a short default timeout
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default_config();
    config.tools = local_tools();
    config.execution.timeout_seconds = 10;
    config
}

pub fn test_gateway() -> Gateway {
    Gateway::new(test_config()).unwrap()
}

/// Write a policy override file into `dir`
pub fn write_policy(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("policy.toml");
    fs::write(&path, contents).unwrap();
    path
}

/// Probe that reports a fixed set of tools as installed and counts calls
#[derive(Clone, Default)]
pub struct StaticProbe {
    installed: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl StaticProbe {
    pub fn new(installed: &[&str]) -> Self {
        Self {
            installed: installed.iter().map(|s| s.to_string()).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolProbe for StaticProbe {
    async fn is_installed(&self, tool: &CliToolDescriptor) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.installed.contains(&tool.name)
    }
}
