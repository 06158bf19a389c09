//! Service wiring: startup order, the runtime event loop, and shutdown.
//!
//! Startup is strictly ordered: configuration is validated, then the
//! ledger streams every persisted account into memory, and only then do
//! the reset schedule and event loop start. A storage failure during the
//! load is fatal — the process must not run with a partially loaded
//! ledger.

use crate::activity::ActivitySet;
use crate::config::PairupConfig;
use crate::error::Result;
use crate::gateway::{Notice, PairingGateway};
use crate::ledger::Ledger;
use crate::pairing::PairingService;
use crate::resets::ResetCycle;
use crate::scheduler::ResetScheduler;
use crate::storage::AccountStore;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// External events fed into the runtime by the platform glue.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A member did something that counts as activity (e.g. spoke in the
    /// command channel).
    Activity {
        /// The active member.
        member_id: String,
    },
    /// A member asked to open a pairing invitation.
    Invite {
        /// The inviting member.
        inviter_id: String,
    },
}

/// Run the pairing service until `shutdown` fires or the event channel
/// closes.
///
/// Each invite event runs as its own task, so several invitations can be
/// in flight at once; they interleave only at await points.
///
/// # Errors
///
/// Returns [`PairError::Config`](crate::error::PairError::Config) for
/// invalid configuration and [`PairError::Storage`]
/// (crate::error::PairError::Storage) when the initial ledger load fails.
/// Both are fatal; nothing is started.
pub async fn run(
    config: PairupConfig,
    gateway: Arc<dyn PairingGateway>,
    store: Box<dyn AccountStore>,
    mut events: mpsc::Receiver<RuntimeEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    config.validate()?;

    let cycle = ResetCycle::new(config.reset.anchor, config.reset.interval_secs);
    let mut ledger = Ledger::new(store, cycle);
    ledger.load().await?;
    let ledger = Arc::new(tokio::sync::Mutex::new(ledger));

    let active = Arc::new(Mutex::new(ActivitySet::new(
        config.pairing.activity_window(),
    )));
    let cooldowns = Arc::new(Mutex::new(ActivitySet::new(
        config.pairing.invite_cooldown(),
    )));

    // The announcement schedule and the ledger's lazy per-account rollover
    // observe the same boundaries independently; they are never coupled.
    let scheduler = ResetScheduler::new(cycle);
    let announce_gateway = Arc::clone(&gateway);
    let reset_handle = scheduler.schedule(move || {
        let gateway = Arc::clone(&announce_gateway);
        async move {
            info!("announcing cycle reset");
            gateway.notify(Notice::CycleReset).await?;
            Ok(())
        }
    });

    let service = Arc::new(PairingService::new(
        config,
        gateway,
        ledger,
        active,
        cooldowns,
    ));

    info!("pairup runtime ready");

    let mut invites = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("shutdown requested");
                break;
            }
            event = events.recv() => match event {
                None => {
                    info!("event channel closed");
                    break;
                }
                Some(RuntimeEvent::Activity { member_id }) => {
                    service.note_activity(&member_id);
                }
                Some(RuntimeEvent::Invite { inviter_id }) => {
                    let service = Arc::clone(&service);
                    invites.spawn(async move {
                        match service.handle_invite(&inviter_id).await {
                            Ok(outcome) => {
                                debug!(inviter = %inviter_id, ?outcome, "invite resolved");
                            }
                            Err(err) => {
                                error!(inviter = %inviter_id, "invite flow failed: {err}");
                            }
                        }
                    });
                }
            },
            // Reap finished invitation tasks as they complete.
            Some(_) = invites.join_next(), if !invites.is_empty() => {}
        }
    }

    reset_handle.join().await;
    // In-flight invitations are not persisted; dropping them on shutdown
    // is the documented behavior (the platform side times out).
    invites.shutdown().await;
    info!("pairup runtime stopped");
    Ok(())
}
