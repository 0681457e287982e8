//! Built-in rule set used when no override file is configured.
//!
//! Dangerous and safe entries are literal prefixes of the raw command. Safe
//! patterns carry a trailing space where the resource name must follow, so
//! `kubectl delete pod ` does not also cover `kubectl delete pods --all`.

/// (tool, dangerous prefixes)
pub const DEFAULT_DANGEROUS_COMMANDS: &[(&str, &[&str])] = &[
    (
        "kubectl",
        &[
            "kubectl delete",
            "kubectl drain",
            "kubectl replace --force",
            "kubectl taint",
            "kubectl port-forward",
            "kubectl cp",
            "kubectl proxy",
            "kubectl certificate approve",
        ],
    ),
    (
        "helm",
        &[
            "helm uninstall",
            "helm delete",
            "helm rollback",
            "helm plugin install",
            "helm plugin uninstall",
            "helm repo remove",
        ],
    ),
    (
        "istioctl",
        &[
            "istioctl install",
            "istioctl uninstall",
            "istioctl manifest apply",
            "istioctl x uninstall",
            "istioctl experimental uninstall",
            "istioctl tag remove",
        ],
    ),
    (
        "argocd",
        &[
            "argocd app delete",
            "argocd app terminate-op",
            "argocd cluster rm",
            "argocd repo rm",
            "argocd proj delete",
            "argocd account delete-token",
        ],
    ),
    (
        "rancher",
        &[
            "rancher rm",
            "rancher clusters delete",
            "rancher projects delete",
            "rancher namespaces delete",
            "rancher apps delete",
        ],
    ),
];

/// (tool, safe prefixes that override a dangerous match)
pub const DEFAULT_SAFE_PATTERNS: &[(&str, &[&str])] = &[
    (
        "kubectl",
        &[
            "kubectl delete pod ",
            "kubectl delete deployment ",
            "kubectl delete service ",
            "kubectl delete configmap ",
            "kubectl delete secret ",
            "kubectl delete job ",
            "kubectl delete --help",
            "kubectl drain --help",
            "kubectl taint --help",
            "kubectl port-forward --help",
            "kubectl cp --help",
            "kubectl proxy --help",
        ],
    ),
    (
        "helm",
        &[
            "helm uninstall --help",
            "helm uninstall --dry-run",
            "helm delete --help",
            "helm rollback --help",
            "helm rollback --dry-run",
            "helm plugin install --help",
        ],
    ),
    (
        "istioctl",
        &[
            "istioctl install --dry-run",
            "istioctl install --help",
            "istioctl uninstall --dry-run",
            "istioctl uninstall --help",
            "istioctl manifest apply --dry-run",
        ],
    ),
    (
        "argocd",
        &[
            "argocd app delete --help",
            "argocd cluster rm --help",
            "argocd repo rm --help",
            "argocd proj delete --help",
        ],
    ),
    (
        "rancher",
        &[
            "rancher rm --help",
            "rancher clusters delete --help",
            "rancher projects delete --help",
        ],
    ),
];

/// (tool, [(regex, rejection message)])
pub const DEFAULT_REGEX_RULES: &[(&str, &[(&str, &str)])] = &[
    (
        "kubectl",
        &[
            (
                r"kubectl\s+delete\s+(\S+\s+)*--all\b",
                "Deleting all resources of a kind is restricted",
            ),
            (
                r"kubectl\s+delete\s+(\S+\s+)*(-l|--selector)",
                "Deleting resources by label selector is restricted",
            ),
            (
                r"kubectl\s+delete\s+(namespace|namespaces|ns)\s+(kube-system|kube-public|kube-node-lease|default)\b",
                "Deleting system namespaces is not allowed",
            ),
            (
                r"kubectl\s+.*--token(=|\s)",
                "Passing bearer tokens on the command line is not allowed",
            ),
        ],
    ),
    (
        "helm",
        &[(
            r"helm\s+(install|upgrade)\s+.*--set(-string)?[\s=]\S*(password|secret|token)\S*=",
            "Inline credentials in --set values are not allowed",
        )],
    ),
    (
        "argocd",
        &[(
            r"argocd\s+.*--auth-token(=|\s)",
            "Passing auth tokens on the command line is not allowed",
        )],
    ),
];
