//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait and is routed by
//! [`CommandDispatcher`], which loads configuration once for all of them.

pub mod check;
pub mod dispatcher;
pub mod install;
pub mod plan;

pub use check::CheckCommand;
pub use dispatcher::{Command, CommandDispatcher, CommandResult};
pub use install::InstallCommand;
pub use plan::PlanCommand;
