//! Integration tests: the full invitation lifecycle against scripted
//! collaborators.

use pairup::activity::ActivitySet;
use pairup::config::{Milestone, PairupConfig};
use pairup::error::PairError;
use pairup::gateway::{
    AcceptanceSignal, InvitationHandle, InvitationPrompt, MemberProfile, Notice, PairingGateway,
    RejectReason,
};
use pairup::ledger::Ledger;
use pairup::pairing::{InviteOutcome, PairingService};
use pairup::resets::ResetCycle;
use pairup::storage::{AccountStore, MemoryStore};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gateway stub that replays a scripted sequence of acceptance signals and
/// records everything the core pushes back out.
struct ScriptedGateway {
    profiles: HashMap<String, MemberProfile>,
    script: Mutex<VecDeque<AcceptanceSignal>>,
    presented: Mutex<Vec<InvitationPrompt>>,
    rejections: Mutex<Vec<(String, RejectReason)>>,
    notices: Mutex<Vec<Notice>>,
}

impl ScriptedGateway {
    fn new(members: &[(&str, &str, bool)], script: Vec<AcceptanceSignal>) -> Self {
        let profiles = members
            .iter()
            .map(|(id, name, is_bot)| {
                (
                    (*id).to_owned(),
                    MemberProfile {
                        id: (*id).to_owned(),
                        display_name: (*name).to_owned(),
                        is_bot: *is_bot,
                    },
                )
            })
            .collect();
        Self {
            profiles,
            script: Mutex::new(script.into()),
            presented: Mutex::new(Vec::new()),
            rejections: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    fn attempt(&self, id: &str) -> AcceptanceSignal {
        AcceptanceSignal::Attempt(self.profiles[id].clone())
    }

    fn presented(&self) -> Vec<InvitationPrompt> {
        self.presented.lock().expect("lock").clone()
    }

    fn rejections(&self) -> Vec<(String, RejectReason)> {
        self.rejections.lock().expect("lock").clone()
    }

    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
impl PairingGateway for ScriptedGateway {
    fn self_id(&self) -> &str {
        "pairup-bot"
    }

    async fn member_profile(&self, id: &str) -> pairup::Result<Option<MemberProfile>> {
        Ok(self.profiles.get(id).cloned())
    }

    async fn present_invitation(
        &self,
        prompt: &InvitationPrompt,
    ) -> pairup::Result<InvitationHandle> {
        self.presented.lock().expect("lock").push(prompt.clone());
        Ok(InvitationHandle::new())
    }

    async fn next_acceptance(
        &self,
        _handle: &InvitationHandle,
        _wait: Duration,
    ) -> pairup::Result<AcceptanceSignal> {
        // An exhausted script means nobody else pressed accept.
        Ok(self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(AcceptanceSignal::TimedOut))
    }

    async fn reject_attempt(
        &self,
        _handle: &InvitationHandle,
        member: &MemberProfile,
        reason: &RejectReason,
    ) -> pairup::Result<()> {
        self.rejections
            .lock()
            .expect("lock")
            .push((member.id.clone(), reason.clone()));
        Ok(())
    }

    async fn notify(&self, notice: Notice) -> pairup::Result<()> {
        self.notices.lock().expect("lock").push(notice);
        Ok(())
    }
}

/// Store shim so tests can inspect what the ledger persisted.
struct SharedStore(Arc<MemoryStore>);

#[async_trait::async_trait]
impl AccountStore for SharedStore {
    async fn load_all(&self) -> pairup::Result<Vec<(String, pairup::Account)>> {
        self.0.load_all().await
    }
    async fn put_one(&self, id: &str, account: &pairup::Account) -> pairup::Result<()> {
        self.0.put_one(id, account).await
    }
    async fn put_many(&self, entries: &[(String, pairup::Account)]) -> pairup::Result<()> {
        self.0.put_many(entries).await
    }
}

struct Harness {
    service: PairingService,
    gateway: Arc<ScriptedGateway>,
    store: Arc<MemoryStore>,
    ledger: Arc<tokio::sync::Mutex<Ledger>>,
    cooldowns: Arc<Mutex<ActivitySet>>,
}

const MEMBERS: &[(&str, &str, bool)] = &[
    ("alice", "Alice", false),
    ("bob", "Bob", false),
    ("carol", "carol!", false),
    ("dave", "Dave2", false),
    ("dave10", "Dave10", false),
    ("pairup-bot", "Pairup", true),
];

fn harness_with_config(config: PairupConfig, script: Vec<AcceptanceSignal>) -> Harness {
    let gateway = Arc::new(ScriptedGateway::new(MEMBERS, script));
    let store = Arc::new(MemoryStore::new());
    let cycle = ResetCycle::new(config.reset.anchor, config.reset.interval_secs);
    let ledger = Arc::new(tokio::sync::Mutex::new(Ledger::new(
        Box::new(SharedStore(Arc::clone(&store))),
        cycle,
    )));
    let active = Arc::new(Mutex::new(ActivitySet::new(
        config.pairing.activity_window(),
    )));
    let cooldowns = Arc::new(Mutex::new(ActivitySet::new(
        config.pairing.invite_cooldown(),
    )));

    let service = PairingService::new(
        config,
        Arc::clone(&gateway) as Arc<dyn PairingGateway>,
        Arc::clone(&ledger),
        active,
        Arc::clone(&cooldowns),
    );

    Harness {
        service,
        gateway,
        store,
        ledger,
        cooldowns,
    }
}

fn harness(script: Vec<AcceptanceSignal>) -> Harness {
    harness_with_config(PairupConfig::default(), script)
}

#[tokio::test]
async fn successful_pairing_awards_both_sides() {
    let h = harness(Vec::new());
    h.gateway
        .script
        .lock()
        .expect("lock")
        .push_back(h.gateway.attempt("bob"));
    h.service.note_activity("bob");

    let outcome = h.service.handle_invite("alice").await.expect("invite");

    match outcome {
        InviteOutcome::Paired { partner, total } => {
            assert_eq!(partner.id, "bob");
            assert_eq!(total, 2);
        }
        other => panic!("expected Paired, got {other:?}"),
    }

    // Both accounts gained exactly one point and each other's id.
    let mut ledger = h.ledger.lock().await;
    assert_eq!(ledger.total_baked(), 2);
    let alice = ledger.get_or_create("alice").clone();
    let bob = ledger.get_or_create("bob").clone();
    assert_eq!(alice.points, 1);
    assert_eq!(bob.points, 1);
    assert!(alice.paired_this_cycle.contains("bob"));
    assert!(bob.paired_this_cycle.contains("alice"));
    drop(ledger);

    // The commit landed in the store as one batch.
    let dump = h.store.dump();
    assert_eq!(dump["alice"].points, 1);
    assert_eq!(dump["bob"].points, 1);

    // The spam cooldown was cleared on success.
    assert!(!h.cooldowns.lock().expect("lock").has("alice"));

    // Success notice fired, and no milestone is configured for 2.
    let notices = h.gateway.notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        &notices[0],
        Notice::PairSucceeded { total: 2, inviter, partner, .. }
            if inviter.id == "alice" && partner.id == "bob"
    ));
}

#[tokio::test]
async fn expiry_leaves_ledger_untouched_and_notifies_once() {
    let h = harness(Vec::new());
    h.service.note_activity("bob");

    let outcome = h.service.handle_invite("alice").await.expect("invite");

    assert_eq!(outcome, InviteOutcome::Expired);
    assert_eq!(h.ledger.lock().await.total_baked(), 0);
    assert!(h.store.dump().is_empty());

    let notices = h.gateway.notices();
    assert_eq!(notices.len(), 1, "exactly one expiry notice");
    assert!(matches!(&notices[0], Notice::NobodyAccepted { inviter } if inviter.id == "alice"));

    // The spam cooldown stays armed until it expires on its own.
    assert!(h.cooldowns.lock().expect("lock").has("alice"));
}

#[tokio::test]
async fn cancellation_resolves_silently() {
    let h = harness(vec![AcceptanceSignal::Cancelled]);
    h.service.note_activity("bob");

    let outcome = h.service.handle_invite("alice").await.expect("invite");

    assert_eq!(outcome, InviteOutcome::Cancelled);
    assert_eq!(h.ledger.lock().await.total_baked(), 0);
    assert!(h.gateway.notices().is_empty(), "no notice on cancellation");
}

#[tokio::test]
async fn self_acceptance_never_resolves_the_invitation() {
    let h = harness(Vec::new());
    {
        let mut script = h.gateway.script.lock().expect("lock");
        script.push_back(h.gateway.attempt("alice"));
        script.push_back(h.gateway.attempt("pairup-bot"));
        script.push_back(h.gateway.attempt("bob"));
    }
    h.service.note_activity("bob");

    let outcome = h.service.handle_invite("alice").await.expect("invite");

    // The invitation stayed open through both invalid attempts.
    assert!(matches!(
        outcome,
        InviteOutcome::Paired { ref partner, .. } if partner.id == "bob"
    ));

    let rejections = h.gateway.rejections();
    assert_eq!(rejections.len(), 2);
    assert_eq!(rejections[0], ("alice".to_owned(), RejectReason::SelfAcceptance));
    assert_eq!(
        rejections[1],
        ("pairup-bot".to_owned(), RejectReason::SelfAcceptance)
    );
}

#[tokio::test]
async fn already_paired_acceptor_is_rejected_until_reset() {
    let h = harness(Vec::new());
    {
        let mut script = h.gateway.script.lock().expect("lock");
        script.push_back(h.gateway.attempt("bob"));
        script.push_back(h.gateway.attempt("carol"));
    }

    // Alice and Bob already paired this cycle.
    h.ledger
        .lock()
        .await
        .record_pair("alice", "bob")
        .await
        .expect("seed pair");

    h.service.note_activity("bob");
    h.service.note_activity("carol");

    let outcome = h.service.handle_invite("alice").await.expect("invite");

    assert!(matches!(
        outcome,
        InviteOutcome::Paired { ref partner, .. } if partner.id == "carol"
    ));

    let rejections = h.gateway.rejections();
    assert_eq!(rejections.len(), 1);
    let (rejected_id, reason) = &rejections[0];
    assert_eq!(rejected_id, "bob");
    match reason {
        RejectReason::AlreadyPairedThisCycle { wait, .. } => {
            assert!(*wait > Duration::ZERO, "wait until reset must be positive");
        }
        other => panic!("expected AlreadyPairedThisCycle, got {other:?}"),
    }
}

#[tokio::test]
async fn second_invite_during_cooldown_is_throttled() {
    let h = harness(Vec::new());
    h.service.note_activity("bob");

    // First invite expires but leaves the spam cooldown armed.
    let first = h.service.handle_invite("alice").await.expect("invite");
    assert_eq!(first, InviteOutcome::Expired);

    let second = h.service.handle_invite("alice").await.expect("invite");
    assert_eq!(second, InviteOutcome::Throttled);

    // Nothing new was presented for the throttled attempt.
    assert_eq!(h.gateway.presented().len(), 1);
}

#[tokio::test]
async fn storage_failure_rolls_back_and_reports() {
    let h = harness(Vec::new());
    h.gateway
        .script
        .lock()
        .expect("lock")
        .push_back(h.gateway.attempt("bob"));
    h.service.note_activity("bob");
    h.store.set_fail_writes(true);

    let result = h.service.handle_invite("alice").await;

    assert!(matches!(result, Err(PairError::Storage(_))));

    // Neither side is marked as paired, in memory or on disk.
    let mut ledger = h.ledger.lock().await;
    assert_eq!(ledger.total_baked(), 0);
    assert!(!ledger.has_paired_this_cycle("alice", "bob"));
    drop(ledger);
    assert!(h.store.dump().is_empty());

    // No success notice went out for a failed commit.
    assert!(h.gateway.notices().is_empty());
}

#[tokio::test]
async fn milestone_total_triggers_an_extra_notice() {
    let mut config = PairupConfig::default();
    config
        .milestones
        .insert("2".to_owned(), Milestone::Text("the very first pair!".to_owned()));

    let h = harness_with_config(config, Vec::new());
    h.gateway
        .script
        .lock()
        .expect("lock")
        .push_back(h.gateway.attempt("bob"));
    h.service.note_activity("bob");

    h.service.handle_invite("alice").await.expect("invite");

    let notices = h.gateway.notices();
    assert_eq!(notices.len(), 2);
    assert!(matches!(&notices[0], Notice::PairSucceeded { .. }));
    assert!(matches!(
        &notices[1],
        Notice::Milestone { total: 2, flavor_text: Some(text), .. }
            if text == "the very first pair!"
    ));
}

#[tokio::test]
async fn candidates_are_filtered_partitioned_and_sorted() {
    let h = harness(Vec::new());

    // Everyone is active, including the bot and someone who has left.
    for id in ["bob", "carol", "dave", "dave10", "pairup-bot"] {
        h.service.note_activity(id);
    }
    h.service.note_activity("ghost");

    // Alice already paired with Carol this cycle.
    h.ledger
        .lock()
        .await
        .record_pair("alice", "carol")
        .await
        .expect("seed pair");

    let outcome = h.service.handle_invite("alice").await.expect("invite");
    assert_eq!(outcome, InviteOutcome::Expired);

    let presented = h.gateway.presented();
    assert_eq!(presented.len(), 1);
    let prompt = &presented[0];

    // Bot and unresolvable ids are gone; digit runs sort numerically.
    let eligible: Vec<&str> = prompt.eligible.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(eligible, vec!["bob", "dave", "dave10"]);

    let already: Vec<&str> = prompt.already_paired.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(already, vec!["carol"]);

    // Footer total reflects the ledger before this invitation.
    assert_eq!(prompt.total_baked, 2);
}

#[tokio::test]
async fn runtime_end_to_end_pairs_over_events() {
    use pairup::runtime::{self, RuntimeEvent};
    use tokio_util::sync::CancellationToken;

    let gateway = Arc::new(ScriptedGateway::new(MEMBERS, Vec::new()));
    gateway
        .script
        .lock()
        .expect("lock")
        .push_back(gateway.attempt("bob"));
    let store = Arc::new(MemoryStore::new());

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let runtime_task = tokio::spawn(runtime::run(
        PairupConfig::default(),
        Arc::clone(&gateway) as Arc<dyn PairingGateway>,
        Box::new(SharedStore(Arc::clone(&store))),
        rx,
        shutdown.clone(),
    ));

    tx.send(RuntimeEvent::Activity {
        member_id: "bob".to_owned(),
    })
    .await
    .expect("send activity");
    tx.send(RuntimeEvent::Invite {
        inviter_id: "alice".to_owned(),
    })
    .await
    .expect("send invite");

    // Wait for the pairing to land in the store.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if store.dump().len() == 2 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "pairing never reached the store"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), runtime_task)
        .await
        .expect("runtime should stop")
        .expect("runtime task")
        .expect("runtime result");

    let dump = store.dump();
    assert_eq!(dump["alice"].points, 1);
    assert_eq!(dump["bob"].points, 1);
}
