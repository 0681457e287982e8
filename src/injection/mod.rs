pub mod classifier;
pub mod injector;

pub use classifier::{
    CONTEXT_AWARE_TOOLS, ContextAwareTool, NamespaceScope, classify, context_aware_tool,
    is_cluster_scoped_resource,
};
pub use injector::ContextInjector;
