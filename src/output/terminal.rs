//! Terminal renderer: styled flowing text, no tables.

use colored::Colorize;

use crate::models::{CommitInfo, DeploymentEstimate};
use crate::output::OutputRenderer;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

fn commit_line(commit: &CommitInfo) -> String {
    format!(
        "{} {} {} {}",
        commit.id.short().yellow().bold(),
        commit.summary().bold(),
        format!("by {}", commit.author).dimmed(),
        format!("on {}", commit.author_date).dimmed(),
    )
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

impl OutputRenderer for TerminalRenderer {
    fn render(&self, estimate: &DeploymentEstimate) -> String {
        let mut output = String::new();
        let lower = &estimate.lower;

        output.push_str(&format!(" {} {}\n", "✔".green().bold(), "Deployed at or after".bold()));
        output.push_str(&format!("   {}\n", commit_line(&lower.commit)));
        output.push_str(&format!(
            "   {} {}\n",
            "→".cyan(),
            plural(lower.matches, "matching file", "matching files")
        ));
        output.push('\n');

        match &estimate.upper {
            Some(upper) => {
                output.push_str(&format!(" {} {}\n", "⚑".blue().bold(), "Deployed before".bold()));
                output.push_str(&format!("   {}\n", commit_line(upper)));
            }
            None => {
                output.push_str(&format!(
                    " {} {}\n",
                    "⚑".blue().bold(),
                    "No newer change to a monitored file observed".bold()
                ));
            }
        }

        if estimate.ranked.len() > 1 {
            output.push('\n');
            output.push_str(&format!(" {}\n", "Candidates".bold()));
            for (rank, score) in estimate.ranked.iter().enumerate() {
                output.push_str(&format!(
                    "   {}. {} {} {}\n",
                    rank + 1,
                    score.commit.id.short().yellow(),
                    score.commit.summary(),
                    format!("({})", plural(score.matches, "match", "matches")).dimmed(),
                ));
            }
        }

        output.push('\n');
        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(
            " {} probed: {} resolved, {} unresolved\n",
            plural(estimate.probed, "file", "files").bold(),
            estimate.resolved.to_string().green().bold(),
            estimate.unresolved().to_string().yellow().bold(),
        ));

        output
    }
}
