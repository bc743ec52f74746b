//! Command controller.
//!
//! Owns the in-flight backend requests and emits events for presentation layers.

use crate::api::{ApiClient, ApiError};
use crate::model::{Profile, RunRequest};
use crate::panel::{PanelEvent, RunFailure};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    FetchProfiles,
    SyncStatus,
    SaveProfile(Profile),
    DeleteProfile(String),
    StartRun { run_id: u64, request: RunRequest },
    Quit,
}

/// Execute UI commands until `Quit` (or until every sender is gone).
pub(crate) async fn run_controller(
    api: Arc<ApiClient>,
    event_tx: UnboundedSender<PanelEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    // Commands run concurrently; dropping the set on quit aborts whatever is still in flight.
    let mut inflight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => break,
                    Some(cmd) => {
                        debug!(?cmd, "dispatching command");
                        let api = api.clone();
                        let tx = event_tx.clone();
                        inflight.spawn(async move { execute(&api, cmd, &tx).await });
                    }
                }
            }
            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "command task failed");
                }
            }
        }
    }

    inflight.abort_all();
    Ok(())
}

async fn execute(api: &ApiClient, cmd: UiCommand, tx: &UnboundedSender<PanelEvent>) {
    match cmd {
        UiCommand::FetchProfiles => fetch_profiles(api, tx).await,
        UiCommand::SyncStatus => {
            let ev = match api.status().await {
                Ok(status) => PanelEvent::StatusSynced(status),
                Err(e) => PanelEvent::StatusFailed(e.to_string()),
            };
            let _ = tx.send(ev);
        }
        UiCommand::SaveProfile(profile) => match api.save_profile(&profile).await {
            Ok(()) => {
                let _ = tx.send(PanelEvent::ProfileSaved { name: profile.name });
                fetch_profiles(api, tx).await;
            }
            Err(e) => {
                let _ = tx.send(PanelEvent::ProfileSaveFailed(e.to_string()));
            }
        },
        UiCommand::DeleteProfile(name) => match api.delete_profile(&name).await {
            Ok(()) => {
                let _ = tx.send(PanelEvent::ProfileDeleted { name });
                fetch_profiles(api, tx).await;
            }
            Err(e) => {
                let answered = matches!(e, ApiError::Rejected { .. });
                let _ = tx.send(PanelEvent::ProfileDeleteFailed(e.to_string()));
                // A rejection (e.g. 404) means the local list is stale.
                if answered {
                    fetch_profiles(api, tx).await;
                }
            }
        },
        UiCommand::StartRun { run_id, request } => {
            let ev = match api.start_run(&request).await {
                Ok(()) => PanelEvent::RunAccepted { run_id },
                Err(ApiError::Rejected { message, .. }) => PanelEvent::RunFailed {
                    run_id,
                    failure: RunFailure::Rejected(message),
                },
                Err(e) => PanelEvent::RunFailed {
                    run_id,
                    failure: RunFailure::Network(e.to_string()),
                },
            };
            let _ = tx.send(ev);
        }
        UiCommand::Quit => {}
    }
}

async fn fetch_profiles(api: &ApiClient, tx: &UnboundedSender<PanelEvent>) {
    let ev = match api.list_profiles().await {
        Ok(profiles) => {
            PanelEvent::ProfilesLoaded(profiles.into_iter().map(|(name, _)| name).collect())
        }
        Err(e) => PanelEvent::ProfilesFailed(e.to_string()),
    };
    let _ = tx.send(ev);
}
