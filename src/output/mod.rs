//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::models::DeploymentEstimate;

/// Trait for rendering a deployment estimate to an output format.
pub trait OutputRenderer {
    /// Render the estimate to a string.
    fn render(&self, estimate: &DeploymentEstimate) -> String;
}
