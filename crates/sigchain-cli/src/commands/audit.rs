//! Audit command - inspect and verify a persisted chain.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use colored::Colorize;
use sigchain_audit::{ChainVerificationResult, ChainVerifier};
use sigchain_config::Config;
use sigchain_crypto::PublicKeyRegistry;
use sigchain_storage::{AuditEventRow, AuditEventStore, SqliteStore};

use crate::theme::Theme;

/// `--db`, else `storage.path` from config.
pub(crate) fn resolve_db(db: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    db.or_else(|| config.storage.path.clone())
        .context("no database given: pass --db or set storage.path")
}

async fn load_events(db: &Path) -> anyhow::Result<Vec<AuditEventRow>> {
    if !db.exists() {
        bail!("database {} does not exist", db.display());
    }
    let store = SqliteStore::open(db)
        .with_context(|| format!("failed to open {}", db.display()))?;
    let events = store.list_audit_events().await?;
    tracing::debug!(db = %db.display(), count = events.len(), "loaded audit events");
    Ok(events)
}

/// Verify the whole chain; fails if any link or signature is broken.
pub(crate) async fn verify_chain(
    db: &Path,
    registry: Option<&Path>,
    require_signed: bool,
) -> anyhow::Result<()> {
    let events = load_events(db).await?;

    let registry = registry
        .map(|path| {
            PublicKeyRegistry::from_file(path)
                .with_context(|| format!("failed to load registry {}", path.display()))
        })
        .transpose()?;
    let verifier = match &registry {
        Some(registry) => ChainVerifier::new(registry),
        None => {
            println!(
                "{}",
                Theme::warning("No registry given; checking hash links only")
            );
            ChainVerifier::links_only()
        },
    }
    .require_signatures(require_signed);

    let result = verifier.verify(&events);
    report(&result, &events, registry.is_some());

    if !result.valid {
        bail!("audit chain verification failed");
    }
    Ok(())
}

/// Verdict line for a valid chain. Without a registry no signature was
/// checked; with one, every signed event passed.
fn valid_summary(
    result: &ChainVerificationResult,
    events: &[AuditEventRow],
    signatures_checked: bool,
) -> String {
    if !signatures_checked {
        return format!(
            "Chain verified: {} events linked, signatures not checked",
            result.events_checked
        );
    }
    let signed = events.iter().filter(|e| e.signature.is_some()).count();
    let unsigned = events.len().saturating_sub(signed);
    format!(
        "Chain verified: {} events linked, {signed} signatures verified, {unsigned} unsigned",
        result.events_checked
    )
}

fn report(result: &ChainVerificationResult, events: &[AuditEventRow], signatures_checked: bool) {
    if result.valid {
        println!(
            "{}",
            Theme::success(&valid_summary(result, events, signatures_checked))
        );
        return;
    }

    println!(
        "{}",
        Theme::failure(&format!(
            "Chain has {} issue(s) across {} events",
            result.issues.len(),
            result.events_checked
        ))
    );
    if let Some(index) = result.first_broken_index {
        let id = events
            .get(index)
            .map(|e| e.id.to_string())
            .unwrap_or_default();
        println!(
            "{}",
            Theme::kv("First broken link", &format!("#{index} ({id})"))
        );
    }
    for issue in &result.issues {
        println!("{}", Theme::issue(&issue.to_string()));
    }
}

/// Print events, newest last.
pub(crate) async fn show_events(db: &Path, limit: Option<usize>) -> anyhow::Result<()> {
    let events = load_events(db).await?;
    if events.is_empty() {
        println!("{}", Theme::note("No audit events"));
        return Ok(());
    }

    let skip = limit.map_or(0, |n| events.len().saturating_sub(n));

    println!("\n{}", Theme::header("Audit Events"));
    println!(
        "{:<10} {:<20} {:<24} {:<20} {}",
        "ID".dimmed(),
        "CREATED".dimmed(),
        "EVENT".dimmed(),
        "ACTOR".dimmed(),
        "SIGNER".dimmed()
    );
    println!("{}", Theme::rule(96));

    for event in events.iter().skip(skip) {
        let signer = Theme::signer(event.signer_kid.as_deref(), event.signature.is_some());
        println!(
            "{:<10} {:<20} {:<24} {:<20} {}",
            Theme::short_id(event.id),
            Theme::timestamp(&event.created_at),
            event.event_type,
            event.actor_id,
            signer
        );
    }

    println!();
    Ok(())
}
