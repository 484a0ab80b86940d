//! The installation pipeline.
//!
//! - [`step`] - the step abstraction and its shared context
//! - [`steps`] - the concrete steps (directories, Steam, dependencies, build)
//! - [`plan`] - ordered step lists built from configuration
//! - [`sequencer`] - runs a plan under the single-flight guard
//! - [`state`] - observable state of a run

pub mod flight;
pub mod plan;
pub mod sequencer;
pub mod state;
pub mod step;
pub mod steps;

pub use flight::{FlightGuard, SingleFlight};
pub use plan::{build_plan, plan_for, prebuilt_plan};
pub use sequencer::{RunReport, Sequencer, StartOutcome};
pub use state::{Outcome, Phase, PipelineState};
pub use step::{FnAction, InstallStep, Severity, StepAction, StepContext};
