pub mod correlate;
mod exception;
pub mod executor;
pub mod extract;
mod python;
pub mod value;
mod watchdog;

pub use correlate::correlate;
pub use exception::Exception;
pub use executor::{
    ContextVariables, DENY_LIST, ExecutionResult, FunctionResult, SandboxOptions, execute,
};
pub use extract::extract;
pub use value::{Dict, Value};
