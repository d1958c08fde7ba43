//! pagedefer CLI library
//!
//! Page manifests, crawler-view rendering and scripted activation
//! simulation, exposed for integration testing.

pub mod errors;
pub mod manifest;
pub mod output;
pub mod simulate;

pub use errors::CliError;
pub use manifest::{PageManifest, ScriptAction, ScriptStep, SectionManifest};
pub use output::OutputFormat;
pub use simulate::{render_page, simulate, SectionOutcome, SimulationReport};
