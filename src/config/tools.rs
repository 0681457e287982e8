use serde::{Deserialize, Serialize};

/// Out-of-band credentials exported to a tool's process environment
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolCredentials {
    /// Variable the tool reads its control-plane URL from
    pub url_var: String,
    /// Variable the tool reads its token from
    pub token_var: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ToolCredentials {
    pub fn new(url_var: &str, token_var: &str) -> Self {
        Self {
            url_var: url_var.to_string(),
            token_var: token_var.to_string(),
            url: None,
            token: None,
        }
    }
}

/// Static metadata for one governed CLI tool
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CliToolDescriptor {
    pub name: String,
    pub binary: String,
    /// Command whose success proves the tool is installed
    pub check_command: String,
    #[serde(default = "default_help_flag")]
    pub help_flag: String,
    /// Appended to authentication failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ToolCredentials>,
}

fn default_help_flag() -> String {
    "--help".to_string()
}

impl CliToolDescriptor {
    pub fn new(name: &str, binary: &str, check_command: &str) -> Self {
        Self {
            name: name.to_string(),
            binary: binary.to_string(),
            check_command: check_command.to_string(),
            help_flag: default_help_flag(),
            auth_hint: None,
            credentials: None,
        }
    }

    pub fn with_auth_hint(mut self, hint: &str) -> Self {
        self.auth_hint = Some(hint.to_string());
        self
    }

    pub fn with_credentials(mut self, credentials: ToolCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// The tools governed out of the box
pub fn default_tools() -> Vec<CliToolDescriptor> {
    vec![
        CliToolDescriptor::new("kubectl", "kubectl", "kubectl version --client").with_auth_hint(
            "Check your kubeconfig and current context (kubectl config current-context).",
        ),
        CliToolDescriptor::new("helm", "helm", "helm version")
            .with_auth_hint("Helm uses your kubeconfig; verify the current context can reach the cluster."),
        CliToolDescriptor::new("istioctl", "istioctl", "istioctl version --remote=false")
            .with_auth_hint("Check your kubeconfig and that the Istio control plane is reachable."),
        CliToolDescriptor::new("argocd", "argocd", "argocd version --client")
            .with_auth_hint("Run 'argocd login <server>' or set the Argo CD server URL and auth token.")
            .with_credentials(ToolCredentials::new("ARGOCD_SERVER", "ARGOCD_AUTH_TOKEN")),
        CliToolDescriptor::new("rancher", "rancher", "rancher --version")
            .with_auth_hint("Run 'rancher login <url> --token <token>' or configure the Rancher URL and token.")
            .with_credentials(ToolCredentials::new("RANCHER_URL", "RANCHER_TOKEN")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools() {
        let tools = default_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["kubectl", "helm", "istioctl", "argocd", "rancher"]);
        assert!(tools.iter().all(|t| t.help_flag == "--help"));
        assert!(tools.iter().all(|t| t.auth_hint.is_some()));
    }

    #[test]
    fn test_credential_tools() {
        let tools = default_tools();
        let rancher = tools.iter().find(|t| t.name == "rancher").unwrap();
        let credentials = rancher.credentials.as_ref().unwrap();
        assert_eq!(credentials.url_var, "RANCHER_URL");
        assert_eq!(credentials.token_var, "RANCHER_TOKEN");

        let kubectl = tools.iter().find(|t| t.name == "kubectl").unwrap();
        assert!(kubectl.credentials.is_none());
    }

    #[test]
    fn test_descriptor_from_toml_defaults_help_flag() {
        let descriptor: CliToolDescriptor = toml::from_str(
            r#"
name = "oc"
binary = "oc"
check_command = "oc version --client"
"#,
        )
        .unwrap();
        assert_eq!(descriptor.help_flag, "--help");
        assert!(descriptor.credentials.is_none());
    }
}
