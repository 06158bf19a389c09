//! Pairing invitation lifecycle.
//!
//! One [`PairingService::handle_invite`] call drives one invitation from
//! `Invited` through to a terminal state: `Paired`, `Expired`, or
//! `Cancelled` (`Throttled` short-circuits before anything is presented).
//! Several invitations may be in flight at once — each runs as its own
//! task and they interleave only at await points. Acceptance attempts for
//! a single invitation are pulled and evaluated one at a time in this
//! module's loop, so two simultaneous accepts can never both be judged
//! valid against stale eligibility state: whichever attempt is evaluated
//! first transitions the invitation, and the rest find it closed.

use crate::activity::ActivitySet;
use crate::config::PairupConfig;
use crate::error::{PairError, Result};
use crate::gateway::{
    AcceptanceSignal, InvitationPrompt, MemberProfile, Notice, PairingGateway, RejectReason,
};
use crate::ledger::Ledger;
use crate::text::natural_cmp;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Terminal result of one invite request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    /// The inviter already has a recent pending invite; nothing was
    /// presented and no state was created.
    Throttled,
    /// A partner accepted and both accounts were committed.
    Paired {
        /// The accepting member.
        partner: MemberProfile,
        /// New cumulative total after this pairing.
        total: u64,
    },
    /// Nobody accepted before the deadline. The ledger is untouched.
    Expired,
    /// The invitation's platform message disappeared before resolution.
    /// Treated like an expiry, but the "nobody accepted" notice is
    /// suppressed.
    Cancelled,
}

/// Shared state and collaborators behind every in-flight invitation.
pub struct PairingService {
    config: PairupConfig,
    gateway: Arc<dyn PairingGateway>,
    ledger: Arc<tokio::sync::Mutex<Ledger>>,
    active: Arc<Mutex<ActivitySet>>,
    cooldowns: Arc<Mutex<ActivitySet>>,
}

impl PairingService {
    /// Wire up the service. `active` tracks recently-active members;
    /// `cooldowns` is the short invite-spam lock (a second TTL set with
    /// its own timeout).
    #[must_use]
    pub fn new(
        config: PairupConfig,
        gateway: Arc<dyn PairingGateway>,
        ledger: Arc<tokio::sync::Mutex<Ledger>>,
        active: Arc<Mutex<ActivitySet>>,
        cooldowns: Arc<Mutex<ActivitySet>>,
    ) -> Self {
        Self {
            config,
            gateway,
            ledger,
            active,
            cooldowns,
        }
    }

    /// Record a qualifying activity event for `id`.
    pub fn note_activity(&self, id: &str) {
        lock(&self.active).add(id);
    }

    /// Drive one invitation from the given member to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`PairError::Gateway`] when the platform interaction fails
    /// outright, or [`PairError::Storage`] when the pairing commit fails
    /// (in which case neither account is marked as paired).
    pub async fn handle_invite(&self, inviter_id: &str) -> Result<InviteOutcome> {
        // Issuing an invite is itself an activity signal.
        lock(&self.active).add(inviter_id);

        if lock(&self.cooldowns).has(inviter_id) {
            info!(inviter = inviter_id, "invite throttled by spam cooldown");
            return Ok(InviteOutcome::Throttled);
        }

        let inviter = self
            .gateway
            .member_profile(inviter_id)
            .await?
            .ok_or_else(|| {
                PairError::Gateway(format!("inviter {inviter_id} could not be resolved"))
            })?;

        let prompt = self.build_prompt(inviter.clone()).await;

        // Arm the spam lock before the first await on the platform reply:
        // a second invite from the same member must not race this one
        // through the network round trip.
        lock(&self.cooldowns).add(inviter_id);

        let handle = match self.gateway.present_invitation(&prompt).await {
            Ok(handle) => handle,
            Err(err) => {
                // Nothing was presented; let the member try again.
                lock(&self.cooldowns).remove(inviter_id);
                return Err(err);
            }
        };
        info!(
            inviter = inviter_id,
            invitation = %handle,
            eligible = prompt.eligible.len(),
            "invitation presented"
        );

        let deadline =
            tokio::time::Instant::now() + self.config.pairing.acceptance_deadline();

        let partner = loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return self.resolve_expired(&inviter).await;
            }

            match self.gateway.next_acceptance(&handle, remaining).await? {
                AcceptanceSignal::TimedOut => {
                    return self.resolve_expired(&inviter).await;
                }
                AcceptanceSignal::Cancelled => {
                    info!(invitation = %handle, "invitation message removed; resolving silently");
                    return Ok(InviteOutcome::Cancelled);
                }
                AcceptanceSignal::Attempt(acceptor) => {
                    if let Some(partner) = self.evaluate_attempt(&handle, &inviter, acceptor).await
                    {
                        break partner;
                    }
                }
            }
        };

        self.resolve_accepted(&inviter, partner).await
    }

    /// Snapshot the activity window into a rendered candidate list:
    /// inviter and service excluded, bots dropped, natural-sorted, and
    /// partitioned by the inviter's per-cycle history.
    async fn build_prompt(&self, inviter: MemberProfile) -> InvitationPrompt {
        let snapshot = lock(&self.active).snapshot();

        let mut candidates = Vec::new();
        for id in snapshot {
            if id == inviter.id || id == self.gateway.self_id() {
                continue;
            }
            match self.gateway.member_profile(&id).await {
                Ok(Some(profile)) if !profile.is_bot => candidates.push(profile),
                Ok(_) => {}
                Err(err) => {
                    warn!(member = %id, "skipping unresolvable candidate: {err}");
                }
            }
        }
        candidates.sort_by(|a, b| natural_cmp(&a.display_name, &b.display_name));

        let (paired_ids, total_baked) = {
            let mut ledger = self.ledger.lock().await;
            let paired = ledger.get_or_create(&inviter.id).paired_this_cycle.clone();
            (paired, ledger.total_baked())
        };

        let (already_paired, eligible): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|profile| paired_ids.contains(&profile.id));

        InvitationPrompt {
            inviter,
            eligible,
            already_paired,
            total_baked,
        }
    }

    /// Validate one acceptance attempt. Returns the partner profile when
    /// the attempt wins; `None` keeps the invitation open.
    async fn evaluate_attempt(
        &self,
        handle: &crate::gateway::InvitationHandle,
        inviter: &MemberProfile,
        acceptor: MemberProfile,
    ) -> Option<MemberProfile> {
        if acceptor.id == inviter.id || acceptor.id == self.gateway.self_id() {
            self.reject(handle, &acceptor, &RejectReason::SelfAcceptance)
                .await;
            return None;
        }

        // An acceptance attempt is an activity signal, valid or not.
        lock(&self.active).add(&acceptor.id);

        let already = {
            let mut ledger = self.ledger.lock().await;
            if ledger.has_paired_this_cycle(&inviter.id, &acceptor.id) {
                Some(ledger.get_or_create(&inviter.id).cycle_reset_at)
            } else {
                None
            }
        };

        if let Some(retry_at) = already {
            let wait = (retry_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            self.reject(
                handle,
                &acceptor,
                &RejectReason::AlreadyPairedThisCycle { retry_at, wait },
            )
            .await;
            return None;
        }

        Some(acceptor)
    }

    async fn resolve_accepted(
        &self,
        inviter: &MemberProfile,
        partner: MemberProfile,
    ) -> Result<InviteOutcome> {
        let (total, next_reset_at) = {
            let mut ledger = self.ledger.lock().await;
            // Commit runs to completion under the lock: the pairing either
            // lands durably or the ledger rolls it back before we report
            // anything.
            let total = ledger.record_pair(&inviter.id, &partner.id).await?;
            (total, ledger.cycle().next_boundary(Utc::now()))
        };

        lock(&self.cooldowns).remove(&inviter.id);

        info!(
            inviter = %inviter.id,
            partner = %partner.id,
            total,
            "pairing committed"
        );

        let wait = (next_reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.notify_best_effort(Notice::PairSucceeded {
            inviter: inviter.clone(),
            partner: partner.clone(),
            total,
            next_reset_at,
            wait,
        })
        .await;

        if let Some(milestone) = self.config.milestone_for(total) {
            self.notify_best_effort(Notice::Milestone {
                inviter: inviter.clone(),
                partner: partner.clone(),
                total,
                flavor_text: milestone.flavor_text().map(str::to_owned),
            })
            .await;
        }

        Ok(InviteOutcome::Paired { partner, total })
    }

    async fn resolve_expired(&self, inviter: &MemberProfile) -> Result<InviteOutcome> {
        info!(inviter = %inviter.id, "invitation expired with no valid acceptance");
        self.notify_best_effort(Notice::NobodyAccepted {
            inviter: inviter.clone(),
        })
        .await;
        Ok(InviteOutcome::Expired)
    }

    async fn reject(
        &self,
        handle: &crate::gateway::InvitationHandle,
        member: &MemberProfile,
        reason: &RejectReason,
    ) {
        if let Err(err) = self.gateway.reject_attempt(handle, member, reason).await {
            warn!(member = %member.id, "could not deliver rejection: {err}");
        }
    }

    async fn notify_best_effort(&self, notice: Notice) {
        if let Err(err) = self.gateway.notify(notice).await {
            warn!("notification failed: {err}");
        }
    }
}

fn lock<'a>(set: &'a Arc<Mutex<ActivitySet>>) -> std::sync::MutexGuard<'a, ActivitySet> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}
