pub mod backend;
pub mod emit;
pub mod error;
pub mod kernel;
pub mod types;

// Re-export the session-building surface — preserves `lanegen::Kernel`
// etc. for the CLI and tests.
pub use backend::{Accelerator, DevicePtr, Hardware, HardwareKind, KernelArg};
pub use emit::Dialect;
pub use error::{last_error, Error, ErrorKind, Result};
pub use kernel::ops::BinOp;
pub use kernel::{Kernel, Var};
pub use types::{Kind, Lane, Type};
