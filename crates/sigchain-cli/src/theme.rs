//! Terminal styling for command output.

use chrono::{DateTime, Utc};
use colored::Colorize;
use uuid::Uuid;

/// Output styles shared by the subcommands.
pub(crate) struct Theme;

impl Theme {
    /// Section title.
    pub(crate) fn header(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    /// Positive verdict line.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {text}", "✓".green().bold())
    }

    /// Negative verdict line.
    pub(crate) fn failure(text: &str) -> String {
        format!("{} {}", "✗".red().bold(), text.red())
    }

    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow().bold(), text.yellow())
    }

    /// Neutral note, e.g. an empty listing.
    pub(crate) fn note(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// One entry of a chain issue list.
    pub(crate) fn issue(text: &str) -> String {
        format!("  {} {text}", "-".red())
    }

    /// Column rule under a table heading.
    pub(crate) fn rule(width: usize) -> String {
        "─".repeat(width).dimmed().to_string()
    }

    /// Indented `label: value` line.
    pub(crate) fn kv(label: &str, value: &str) -> String {
        format!("  {}: {value}", label.bold())
    }

    /// Signer column: the kid when signed, otherwise `unsigned`.
    pub(crate) fn signer(kid: Option<&str>, signed: bool) -> String {
        match kid {
            Some(kid) if signed => kid.green().to_string(),
            _ => "unsigned".yellow().to_string(),
        }
    }

    /// First block of a UUID.
    pub(crate) fn short_id(id: Uuid) -> String {
        let id = id.simple().to_string();
        id.get(..8).unwrap_or(&id).cyan().to_string()
    }

    pub(crate) fn timestamp(at: &DateTime<Utc>) -> String {
        at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_survives_styling() {
        colored::control::set_override(false);
        assert_eq!(Theme::signer(Some("audit-hmac"), true), "audit-hmac");
        assert_eq!(Theme::signer(Some("audit-hmac"), false), "unsigned");
        assert_eq!(Theme::signer(None, false), "unsigned");
        assert_eq!(Theme::short_id(Uuid::nil()), "00000000");
        assert_eq!(Theme::kv("Key id", "k1"), "  Key id: k1");
        assert_eq!(Theme::rule(3), "───");
    }
}
