//! Session backup CLI commands: backup, restore, exists, cleanup, health.

use anyhow::Context;

use sessionkeeper_core::repository::SessionRepository;
use sessionkeeper_infra::sqlite::session::SqliteSessionRepository;
use sessionkeeper_types::session::SessionId;

use crate::state::AppState;

/// `skeeper backup` - archive the session directory into the store.
pub async fn backup(state: &AppState, session: Option<String>, json: bool) -> anyhow::Result<()> {
    let id = SessionId::normalize(session.as_deref());
    let saved = state.store.save(&id).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "session": id.as_str(),
                "saved": saved,
            }))?
        );
    } else if saved {
        println!(
            "  {} Session '{}' backed up",
            console::style("✓").green(),
            console::style(id.as_str()).cyan()
        );
    } else {
        println!(
            "  {} Nothing to back up for '{}' (no session directory or it is empty)",
            console::style("✗").red(),
            id.as_str()
        );
    }

    if !saved {
        anyhow::bail!("backup did not run");
    }
    Ok(())
}

/// `skeeper restore` - materialize the stored backup into the session
/// directory.
pub async fn restore(state: &AppState, session: Option<String>, json: bool) -> anyhow::Result<()> {
    let id = SessionId::normalize(session.as_deref());
    let restored = state.store.restore(&id).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "session": id.as_str(),
                "restored": restored,
            }))?
        );
    } else if restored {
        println!(
            "  {} Session '{}' restored to {}",
            console::style("✓").green(),
            console::style(id.as_str()).cyan(),
            state.store.session_dir().display()
        );
    } else {
        println!(
            "  {} No usable backup for '{}'",
            console::style("✗").red(),
            id.as_str()
        );
    }

    if !restored {
        anyhow::bail!("restore did not run");
    }
    Ok(())
}

/// `skeeper exists` - report whether a usable backup is stored.
pub async fn exists(state: &AppState, session: Option<String>, json: bool) -> anyhow::Result<()> {
    let id = SessionId::normalize(session.as_deref());
    let found = state.store.exists(&id).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "session": id.as_str(),
                "exists": found,
            }))?
        );
    } else if found {
        println!(
            "  {} Backup exists for '{}'",
            console::style("✓").green(),
            console::style(id.as_str()).cyan()
        );
    } else {
        println!(
            "  {} No backup stored for '{}'",
            console::style("✗").red(),
            id.as_str()
        );
    }
    Ok(())
}

/// `skeeper cleanup` - purge corrupt rows, then list what remains.
pub async fn cleanup(state: &AppState, json: bool) -> anyhow::Result<()> {
    let removed = state.store.cleanup_corrupted().await;

    let repo = SqliteSessionRepository::new(state.db_pool.clone());
    let sessions = repo.list_sessions().await?;

    if json {
        let listed: Vec<serde_json::Value> = sessions
            .iter()
            .map(|s| {
                serde_json::json!({
                    "session": s.session_id,
                    "size": s.size,
                    "created_at": s.created_at.to_rfc3339(),
                    "chunked": s.is_chunked,
                    "chunks": s.chunk_count,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "removed_rows": removed,
                "sessions": listed,
            }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Removed {} corrupt row(s)",
        console::style("🧹").bold(),
        console::style(removed).yellow()
    );
    if sessions.is_empty() {
        println!("  No sessions stored.");
    } else {
        println!();
        for s in &sessions {
            let layout = if s.is_chunked {
                format!("{} chunks", s.chunk_count)
            } else {
                "single record".to_string()
            };
            println!(
                "  {}  {} bytes, {}, saved {}",
                console::style(&s.session_id).cyan(),
                s.size,
                layout,
                s.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    println!();
    Ok(())
}

/// `skeeper health` - probe a running server's `/status` endpoint.
///
/// Exits nonzero when the server is unreachable or reports not-ready,
/// so it slots into container health checks directly.
pub async fn health(url: &str, json: bool) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let status_url = format!("{}/status", url.trim_end_matches('/'));
    let response = client
        .get(&status_url)
        .send()
        .await
        .with_context(|| format!("no response from {status_url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("server returned {}", response.status());
    }
    let body: serde_json::Value = response.json().await.context("invalid status payload")?;
    let ready = body.get("ready").and_then(|v| v.as_bool()).unwrap_or(false);

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else if ready {
        println!(
            "  {} Server is ready ({}s uptime)",
            console::style("✅").bold(),
            body.get("uptime_secs").and_then(|v| v.as_u64()).unwrap_or(0)
        );
        match body.get("last_backup_at").and_then(|v| v.as_str()) {
            Some(at) => println!("  Last backup: {at}"),
            None => println!("  Last backup: never"),
        }
    } else {
        println!(
            "  {} Server is up but not ready (backups not armed)",
            console::style("❌").bold()
        );
    }

    // Listening but not ready is still a failing probe.
    if !ready {
        anyhow::bail!("server is not ready");
    }
    Ok(())
}
