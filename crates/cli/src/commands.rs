//! Command implementations.

use std::process::ExitCode;

use anyhow::Context;
use lockkeeper_core::locking::{AcquireOutcome, LockKey, LockRequest, SessionInfo};
use lockkeeper_core::mask::CatalogFilter;
use lockkeeper_service::{LockManager, PgLockStore, RevokerRightsRegistry};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::{CatalogZone, Commands, FilterArgs, KeyArgs, OutputFormat, RightsAction};

/// Exit status for "the operation ran but the answer is no": a lock that
/// was not acquired, a key that is not locked, a user without rights.
const EXIT_NEGATIVE: u8 = 2;

/// Dispatch a parsed command against the store.
pub async fn run(
    command: Commands,
    store: &PgLockStore,
    manager: &LockManager,
    user: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Migrate => {
            lockkeeper_db::run_migrations(store.pool())
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
            emit(format, &json!({ "migrated": true }), || "Migrations applied".into());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Acquire {
            key,
            revoke,
            timeout,
        } => cmd_acquire(store, manager, user, format, &key, revoke, timeout).await,

        Commands::Release { office, lock_id } => {
            let released = manager.release_lock(store, &office, &lock_id).await?;
            emit(format, &json!({ "released": released }), || {
                if released {
                    format!("Released lock {lock_id}")
                } else {
                    format!("No lock {lock_id} in office {office}")
                }
            });
            Ok(verdict(released))
        }

        Commands::Revoke { key } => {
            let key = lock_key(&key)?;
            let revoked = manager.revoke_lock(store, &key, user).await?;
            emit(format, &json!({ "key": key, "revoked": revoked }), || {
                if revoked {
                    format!("Revoked lock on {key}")
                } else {
                    format!("{key} was not locked")
                }
            });
            Ok(ExitCode::SUCCESS)
        }

        Commands::Status { key } => {
            let key = lock_key(&key)?;
            let locked = manager.is_locked(store, &key).await?;
            emit(format, &json!({ "key": key, "locked": locked }), || {
                format!("{key}: {}", if locked { "locked" } else { "unlocked" })
            });
            Ok(verdict(locked))
        }

        Commands::Locks { filter, time_zone } => {
            let filter = catalog_filter(&filter)?;
            let locks = match time_zone {
                CatalogZone::Named(tz) => manager.cat_locks(store, &filter, &tz).await?,
                CatalogZone::Fixed(offset) => manager.cat_locks(store, &filter, &offset).await?,
            };
            emit(format, &locks, || {
                if locks.is_empty() {
                    return "No locks".into();
                }
                locks
                    .iter()
                    .map(|l| {
                        format!(
                            "{}/{}/{}\t{}\t{}\t{}{}",
                            l.office_id,
                            l.project_id,
                            l.application_id,
                            l.lock_id,
                            l.acquire_time.to_rfc3339(),
                            l.session_user.as_deref().unwrap_or("-"),
                            match &l.revoke_requested_by {
                                Some(by) => format!("\trevoke requested by {by}"),
                                None => String::new(),
                            }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            Ok(ExitCode::SUCCESS)
        }

        Commands::LockInfo { office, lock_id } => {
            let lock = manager.get_lock(store, &office, &lock_id).await?;
            let pending = lock.as_ref().and_then(|l| l.pending_revocation());
            emit(
                format,
                &json!({ "lock": lock, "pending_revocation": pending }),
                || match (&lock, &pending) {
                    (None, _) => format!("Lock {lock_id} is not held"),
                    (Some(l), None) => format!(
                        "Lock {} holds {}/{}/{} since {}",
                        l.lock_id,
                        l.office_id,
                        l.project_id,
                        l.application_id,
                        l.acquire_time.to_rfc3339()
                    ),
                    (Some(l), Some(p)) => format!(
                        "Lock {} holds {}/{}/{}; revocation requested by {} at {}",
                        l.lock_id,
                        l.office_id,
                        l.project_id,
                        l.application_id,
                        p.requested_by,
                        p.requested_at.to_rfc3339()
                    ),
                },
            );
            Ok(verdict(lock.is_some()))
        }

        Commands::Rights { action } => cmd_rights(store, action, format).await,
    }
}

async fn cmd_acquire(
    store: &PgLockStore,
    manager: &LockManager,
    user: Option<&str>,
    format: OutputFormat,
    key: &KeyArgs,
    revoke: bool,
    timeout: Option<i64>,
) -> anyhow::Result<ExitCode> {
    let mut request = LockRequest::new(lock_key(key)?).with_session(SessionInfo {
        session_user: user.map(str::to_string),
        os_user: std::env::var("USER").ok(),
        session_program: Some(env!("CARGO_PKG_NAME").to_string()),
        session_machine: std::env::var("HOSTNAME").ok(),
    });
    if revoke {
        request = request.revoking(timeout.unwrap_or(manager.config().default_revoke_timeout_secs));
    }

    // Ctrl-C abandons a revocation wait instead of killing the process
    // mid-statement.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = manager
        .request_lock_cancellable(store, &request, user, &cancel)
        .await;
    signal_task.abort();
    let outcome = outcome?;

    emit(format, &outcome, || match &outcome {
        AcquireOutcome::Acquired { lock_id } => format!("Acquired {} as {lock_id}", request.key),
        AcquireOutcome::LockHeld {
            held_by,
            acquired_at,
        } => format!(
            "{} is held by {} since {}",
            request.key,
            held_by.as_deref().unwrap_or("unknown"),
            acquired_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".into())
        ),
        AcquireOutcome::RevokeDenied => {
            format!("Not allowed to revoke the lock on {}", request.key)
        }
        AcquireOutcome::RevokeTimedOut { waited_ms } => format!(
            "Holder of {} did not release within {waited_ms} ms",
            request.key
        ),
    });
    Ok(verdict(outcome.is_acquired()))
}

async fn cmd_rights(
    store: &PgLockStore,
    action: RightsAction,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    match action {
        RightsAction::Allow {
            office,
            grantee,
            office_mask,
            project_mask,
            application_mask,
        } => {
            let office_mask = office_mask.unwrap_or_else(|| office.clone());
            let right = RevokerRightsRegistry::allow_lock_revoker_rights(
                store,
                &office,
                &office_mask,
                &project_mask,
                &application_mask,
                &grantee,
            )
            .await?;
            emit(format, &right, || {
                format!(
                    "{} may revoke {}/{}/{} (grant owned by {})",
                    right.user_id,
                    right.office_mask,
                    right.project_mask,
                    right.application_mask,
                    right.office_id
                )
            });
            Ok(ExitCode::SUCCESS)
        }

        RightsAction::Update {
            office,
            grantee,
            project_mask,
            application_mask,
            office_mask,
            allow,
        } => {
            let office_mask = office_mask.unwrap_or_else(|| office.clone());
            RevokerRightsRegistry::update_lock_revoker_rights(
                store,
                &office,
                &grantee,
                &project_mask,
                &application_mask,
                &office_mask,
                allow,
            )
            .await?;
            emit(format, &json!({ "allowed": allow }), || {
                let verb = if allow { "granted" } else { "removed" };
                format!("Revoker right {verb} for {grantee}")
            });
            Ok(ExitCode::SUCCESS)
        }

        RightsAction::RemoveAll {
            office,
            grantee,
            office_mask,
            application_mask,
        } => {
            let removed = RevokerRightsRegistry::remove_all_lock_revoker_rights(
                store,
                &office,
                office_mask.as_deref(),
                application_mask.as_deref(),
                &grantee,
            )
            .await?;
            emit(format, &json!({ "removed": removed }), || {
                format!("Removed {removed} revoker right(s) for {grantee}")
            });
            Ok(ExitCode::SUCCESS)
        }

        RightsAction::Check { key, grantee } => {
            let allowed = RevokerRightsRegistry::has_lock_revoker_rights(
                store,
                &key.office,
                Some(grantee.as_str()),
                &key.project,
                &key.application,
            )
            .await?;
            emit(format, &json!({ "allowed": allowed }), || {
                let modal = if allowed { "may" } else { "may not" };
                format!(
                    "{grantee} {modal} revoke {}/{}/{}",
                    key.office, key.project, key.application
                )
            });
            Ok(verdict(allowed))
        }

        RightsAction::List { filter } => {
            let filter = catalog_filter(&filter)?;
            let rights = RevokerRightsRegistry::cat_lock_revoker_rights(store, &filter).await?;
            emit(format, &rights, || {
                if rights.is_empty() {
                    return "No revoker rights".into();
                }
                rights
                    .iter()
                    .map(|r| {
                        format!(
                            "{}\t{}\t{}\t{}\t{}",
                            r.office_id, r.user_id, r.office_mask, r.project_mask, r.application_mask
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lock_key(args: &KeyArgs) -> anyhow::Result<LockKey> {
    LockKey::new(&args.office, &args.project, &args.application).context("Invalid lock key")
}

fn catalog_filter(args: &FilterArgs) -> anyhow::Result<CatalogFilter> {
    CatalogFilter::new(
        args.project.as_deref(),
        args.application.as_deref(),
        args.office.as_deref(),
    )
    .context("Invalid catalog mask")
}

fn verdict(yes: bool) -> ExitCode {
    if yes {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NEGATIVE)
    }
}

/// Print `value` as JSON, or the text rendering.
fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce() -> String) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(out) => println!("{out}"),
            Err(e) => tracing::error!(error = %e, "Failed to serialize output"),
        },
        OutputFormat::Text => println!("{}", text()),
    }
}
