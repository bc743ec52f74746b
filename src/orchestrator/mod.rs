//! Application-level orchestration.
//!
//! This module executes the commands issued by the panel against the backend API and reports
//! every outcome back as a `PanelEvent`. UI/CLI layers only talk to it through channels, so
//! presentation never awaits the network directly.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
