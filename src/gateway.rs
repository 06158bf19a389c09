//! Platform collaborator contract.
//!
//! The chat client (message rendering, buttons, command registration) lives
//! outside this crate and implements [`PairingGateway`]. The core treats
//! every gateway call as best-effort: transient platform failures surface
//! as [`PairError::Gateway`](crate::error::PairError::Gateway), are logged
//! at the call site, and never crash the process.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// A resolved chat member, as the platform sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    /// Opaque member identifier.
    pub id: String,
    /// Name shown in candidate lists and announcements.
    pub display_name: String,
    /// Automated accounts never participate in pairings.
    pub is_bot: bool,
}

impl MemberProfile {
    /// Convenience constructor for a human member.
    #[must_use]
    pub fn member(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_bot: false,
        }
    }
}

/// Everything the platform needs to render one open invitation.
///
/// `eligible` and `already_paired` are both shown, but only eligible
/// members may accept; both lists arrive natural-sorted by display name.
#[derive(Debug, Clone)]
pub struct InvitationPrompt {
    /// Member who opened the invitation.
    pub inviter: MemberProfile,
    /// Recently-active members who may accept.
    pub eligible: Vec<MemberProfile>,
    /// Recently-active members already paired with the inviter this cycle
    /// (informational only).
    pub already_paired: Vec<MemberProfile>,
    /// Cumulative total before this pairing, for the prompt footer.
    pub total_baked: u64,
}

/// Opaque reference to one presented invitation. The gateway maps this to
/// its platform message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvitationHandle(Uuid);

impl InvitationHandle {
    /// Mint a fresh handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvitationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvitationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One wake-up of the acceptance wait: an attempt to evaluate, or a
/// terminal signal. Timeout and cancellation are ordinary outcomes here,
/// not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptanceSignal {
    /// A member pressed accept; the core validates the attempt.
    Attempt(MemberProfile),
    /// No attempt arrived within the requested wait.
    TimedOut,
    /// The invitation's platform message was deleted before resolution.
    Cancelled,
}

/// Why an individual acceptance attempt was turned away. The invitation
/// itself stays open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The acceptor is the inviter (or the service itself).
    SelfAcceptance,
    /// Acceptor already paired with the inviter this cycle.
    AlreadyPairedThisCycle {
        /// When the pair may go again.
        retry_at: DateTime<Utc>,
        /// Time remaining until then; render with
        /// [`human_duration`](crate::text::human_duration).
        wait: Duration,
    },
}

/// Best-effort announcement pushed through the platform.
#[derive(Debug, Clone)]
pub enum Notice {
    /// A pairing resolved successfully.
    PairSucceeded {
        /// Inviter side of the pair.
        inviter: MemberProfile,
        /// Accepting side of the pair.
        partner: MemberProfile,
        /// New cumulative total.
        total: u64,
        /// Boundary at which this pair may go again.
        next_reset_at: DateTime<Utc>,
        /// Time remaining until that boundary; render with
        /// [`human_duration`](crate::text::human_duration).
        wait: Duration,
    },
    /// An invitation expired with no valid acceptance.
    NobodyAccepted {
        /// Member whose invitation expired.
        inviter: MemberProfile,
    },
    /// The new cumulative total hit a configured milestone.
    Milestone {
        /// Inviter side of the milestone pairing.
        inviter: MemberProfile,
        /// Accepting side of the milestone pairing.
        partner: MemberProfile,
        /// The milestone total; render with
        /// [`format_ordinal_currency`](crate::text::format_ordinal_currency)
        /// ("the 100th melon bread").
        total: u64,
        /// Configured flavor text, if any.
        flavor_text: Option<String>,
    },
    /// A reset boundary passed; per-pair cooldowns are cleared.
    CycleReset,
}

/// Contract the chat-platform glue implements for the pairing core.
///
/// Once the core stops polling a handle (the invitation resolved, expired,
/// or was cancelled), the platform side must answer any further acceptance
/// attempts with an "invitation no longer available" reply rather than
/// silently ignoring them.
#[async_trait::async_trait]
pub trait PairingGateway: Send + Sync {
    /// The service's own member identifier (never a pairing candidate).
    fn self_id(&self) -> &str;

    /// Resolve a member id to a profile. `Ok(None)` when the member is no
    /// longer reachable (left the community, stale id).
    async fn member_profile(&self, id: &str) -> Result<Option<MemberProfile>>;

    /// Render and publish an open invitation.
    async fn present_invitation(&self, prompt: &InvitationPrompt) -> Result<InvitationHandle>;

    /// Wait up to `wait` for the next acceptance attempt on `handle`.
    ///
    /// Called in a loop by the core; attempts are therefore evaluated one
    /// at a time, which is what makes acceptance arbitration race-free.
    async fn next_acceptance(
        &self,
        handle: &InvitationHandle,
        wait: Duration,
    ) -> Result<AcceptanceSignal>;

    /// Tell one member privately why their attempt was turned away.
    async fn reject_attempt(
        &self,
        handle: &InvitationHandle,
        member: &MemberProfile,
        reason: &RejectReason,
    ) -> Result<()>;

    /// Publish an announcement. Fire-and-forget from the core's view.
    async fn notify(&self, notice: Notice) -> Result<()>;
}
