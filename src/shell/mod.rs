//! Process execution and search-path management.

pub mod command;
pub mod mock;
pub mod path;
pub mod platform;
pub mod template;

pub use command::{CaptureMode, ProcessInvocation, ProcessResult, ProcessRunner, SystemRunner};
pub use mock::{Reply, ScriptedRunner};
pub use path::{
    prepend_paths, FixedMachinePath, MachinePathSource, ManagedPathRunner, PathManager, SearchPath,
    SystemMachinePath,
};
pub use platform::{is_ci, is_elevated};
pub use template::CommandTemplate;
