//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use deploytrace::repo::mirror::RepoSlug;

/// Tool banner with ANSI styling for clap help output.
pub const ABOUT_STYLED: &str = concat!(
    "\x1b[1mdeploytrace\x1b[0m ",
    "\x1b[2m· Fingerprint a live site's files against git history.\x1b[0m"
);

/// Print the repository summary banner to stderr.
///
/// `size_kib` is the size reported by the hosting API, when known.
pub fn print_banner(slug: &RepoSlug, size_kib: Option<u64>) {
    use colored::Colorize;
    use std::io::Write;
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle);
    let _ = writeln!(handle, "  {}  {}", "owner:".cyan(), slug.owner.bold());
    let _ = writeln!(handle, "  {}   {}", "repo:".cyan(), slug.name.bold());
    if let Some(kib) = size_kib {
        let _ = writeln!(handle, "  {}   {}", "size:".cyan(), format_kib(kib));
    }
    let _ = writeln!(handle);
    let _ = handle.flush();
}

fn format_kib(kib: u64) -> String {
    if kib >= 1024 * 1024 {
        format!("{:.1} GiB", kib as f64 / (1024.0 * 1024.0))
    } else if kib >= 1024 {
        format!("{:.1} MiB", kib as f64 / 1024.0)
    } else {
        format!("{kib} KiB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploytrace::repo::mirror::parse_slug;

    #[test]
    fn print_banner_without_size() {
        let slug = parse_slug("https://github.com/acme/shop.git").unwrap();
        // Should not panic without a size.
        print_banner(&slug, None);
    }

    #[test]
    fn print_banner_with_size() {
        let slug = parse_slug("git@github.com:acme/shop.git").unwrap();
        print_banner(&slug, Some(2048));
    }

    #[test]
    fn kib_formatting() {
        assert_eq!(format_kib(12), "12 KiB");
        assert_eq!(format_kib(1536), "1.5 MiB");
        assert_eq!(format_kib(3 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn about_banner_is_non_empty() {
        assert!(ABOUT_STYLED.contains("deploytrace"));
    }
}
