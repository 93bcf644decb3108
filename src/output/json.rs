//! JSON output renderer.
//!
//! Outputs `{"estimate": {...}, "summary": {...}}` format.

use serde::Serialize;

use crate::models::DeploymentEstimate;
use crate::output::OutputRenderer;

/// JSON output renderer.
pub struct JsonRenderer;

#[derive(Serialize)]
struct Summary {
    probed: usize,
    resolved: usize,
    unresolved: usize,
}

impl OutputRenderer for JsonRenderer {
    fn render(&self, estimate: &DeploymentEstimate) -> String {
        let summary = Summary {
            probed: estimate.probed,
            resolved: estimate.resolved,
            unresolved: estimate.unresolved(),
        };

        let output = serde_json::json!({
            "estimate": estimate,
            "summary": summary,
        });

        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }
}
