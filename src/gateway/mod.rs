pub mod facade;
pub mod probe;
pub mod result;

pub use facade::Gateway;
pub use probe::{CommandProbe, ToolProbe};
pub use result::{ErrorDetails, ErrorInfo, ExecutionResult, Status};
