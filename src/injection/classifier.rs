//! Decides whether a command for a context-aware tool is namespace scoped.
//!
//! The decision is a pure function of the token list: the verb is the first
//! positional token after the binary and the resource is the first
//! positional token after the verb. Anything the tables below do not cover
//! classifies as `Unknown`, and callers leave the namespace alone.

/// A tool whose commands accept cluster context and namespace flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAwareTool {
    /// Tool name, matched against the configured tool rather than its binary path
    pub name: &'static str,
    pub context_flag: &'static str,
    pub namespaced_verbs: &'static [&'static str],
}

pub const KUBECTL_NAMESPACED_VERBS: &[&str] = &[
    "get",
    "describe",
    "delete",
    "edit",
    "label",
    "annotate",
    "patch",
    "apply",
    "logs",
    "exec",
    "rollout",
    "scale",
    "autoscale",
    "expose",
];

pub const HELM_NAMESPACED_VERBS: &[&str] = &[
    "install",
    "upgrade",
    "uninstall",
    "delete",
    "list",
    "ls",
    "status",
    "history",
    "rollback",
    "get",
    "test",
];

pub const ISTIOCTL_NAMESPACED_VERBS: &[&str] = &[
    "analyze",
    "proxy-config",
    "pc",
    "proxy-status",
    "ps",
    "dashboard",
    "dash",
    "kube-inject",
];

pub const CONTEXT_AWARE_TOOLS: &[ContextAwareTool] = &[
    ContextAwareTool {
        name: "kubectl",
        context_flag: "--context",
        namespaced_verbs: KUBECTL_NAMESPACED_VERBS,
    },
    ContextAwareTool {
        name: "istioctl",
        context_flag: "--context",
        namespaced_verbs: ISTIOCTL_NAMESPACED_VERBS,
    },
    ContextAwareTool {
        name: "helm",
        context_flag: "--kube-context",
        namespaced_verbs: HELM_NAMESPACED_VERBS,
    },
];

/// Resource kinds (with plural and short forms) that live outside namespaces
pub const CLUSTER_SCOPED_RESOURCES: &[&str] = &[
    "node",
    "nodes",
    "no",
    "namespace",
    "namespaces",
    "ns",
    "persistentvolume",
    "persistentvolumes",
    "pv",
    "storageclass",
    "storageclasses",
    "sc",
    "clusterrole",
    "clusterroles",
    "clusterrolebinding",
    "clusterrolebindings",
    "apiservice",
    "apiservices",
    "certificatesigningrequest",
    "certificatesigningrequests",
    "csr",
    "customresourcedefinition",
    "customresourcedefinitions",
    "crd",
    "crds",
];

/// Subcommands that never operate inside a namespace
pub const CLUSTER_SCOPED_COMMANDS: &[&str] = &[
    "api-resources",
    "api-versions",
    "cluster-info",
    "config",
    "version",
    "completion",
    "plugin",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceScope {
    Namespaced,
    ClusterScoped,
    Unknown,
}

/// Look up the context-aware tool by tool name
pub fn context_aware_tool(name: &str) -> Option<&'static ContextAwareTool> {
    CONTEXT_AWARE_TOOLS.iter().find(|tool| tool.name == name)
}

/// Tokens that belong to the tool itself, before any `--` separator
pub fn tool_tokens(tokens: &[String]) -> &[String] {
    match tokens.iter().position(|t| t == "--") {
        Some(idx) => &tokens[..idx],
        None => tokens,
    }
}

/// Classify a tokenized command whose first token invokes `tool`
pub fn classify(tool: &ContextAwareTool, tokens: &[String]) -> NamespaceScope {
    let tokens = tool_tokens(tokens);
    let mut positionals = tokens.iter().skip(1).filter(|t| !t.starts_with('-'));

    let Some(verb) = positionals.next() else {
        return NamespaceScope::Unknown;
    };

    if CLUSTER_SCOPED_COMMANDS.contains(&verb.as_str()) {
        return NamespaceScope::ClusterScoped;
    }

    if !tool.namespaced_verbs.contains(&verb.as_str()) {
        return NamespaceScope::Unknown;
    }

    match positionals.next() {
        Some(resource) if is_cluster_scoped_resource(resource) => NamespaceScope::ClusterScoped,
        _ => NamespaceScope::Namespaced,
    }
}

/// Whether a resource argument names a cluster-scoped kind
///
/// Accepts `kind`, `kind/name`, `kind.group` and comma lists; a list counts
/// as cluster scoped when any member is.
pub fn is_cluster_scoped_resource(resource: &str) -> bool {
    let kinds = resource.split('/').next().unwrap_or(resource);

    kinds.split(',').any(|kind| {
        let kind = kind.split('.').next().unwrap_or(kind).to_lowercase();
        CLUSTER_SCOPED_RESOURCES.contains(&kind.as_str())
    })
}
