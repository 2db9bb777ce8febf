//! Command resolver
//!
//! Turns a free-text command plus fresh registry lookup results into a
//! deterministic reply: register directly, ask to disambiguate, ask to
//! confirm removal, or reject. Offers mutate nothing; the store only changes
//! when a pending-action token comes back through the callback path (or
//! immediately, when the auto-confirm policy is enabled).

pub mod command;

use std::sync::Arc;
use tracing::{info, warn};

use crate::lookup::Lookup;
use crate::model::{Record, WatchEntry};
use crate::notify::Action;
use crate::pending::{PendingIntent, PendingLedger};
use crate::store::WatchlistStore;
use crate::types::CertwatchError;

pub use command::{parse, Command};

/// Resolver reply: user-facing text plus optional action buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub actions: Vec<Action>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    fn with_actions(text: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            text: text.into(),
            actions,
        }
    }
}

/// Resolver policy knobs
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Commit exact matches without a confirmation round-trip
    pub auto_confirm: bool,
    /// Maximum candidates offered in a disambiguation reply
    pub disambiguation_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_confirm: false,
            disambiguation_limit: 10,
        }
    }
}

/// How a register query resolved against the lookup candidates
enum Resolution {
    /// No usable candidate; offer a bare registration
    NoExactResult,
    /// Exactly one candidate whose name matches the query exactly
    Exact(Record),
    /// Several candidates the user must choose between
    Ambiguous(Vec<Record>),
}

pub struct Resolver {
    store: Arc<WatchlistStore>,
    ledger: Arc<PendingLedger>,
    lookup: Arc<dyn Lookup>,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(
        store: Arc<WatchlistStore>,
        ledger: Arc<PendingLedger>,
        lookup: Arc<dyn Lookup>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            lookup,
            config,
        }
    }

    /// Resolve one inbound command into a reply
    pub async fn handle_command(&self, text: &str, caller_target: &str) -> Reply {
        match command::parse(text) {
            Command::Help => Reply::text(
                "Commands:\n\
                 - MODEL or +MODEL: register a model for change alerts\n\
                 - -MODEL: remove a model\n\
                 - list: show registered models",
            ),
            Command::List => self.list(),
            Command::Register(name) => self.register(&name, caller_target).await,
            Command::Remove(name) => self.remove(&name),
            Command::Unrecognized => Reply::text("Please provide a model name after the prefix."),
        }
    }

    fn list(&self) -> Reply {
        let entries = self.store.list();
        if entries.is_empty() {
            return Reply::text("No models registered.");
        }
        let names: Vec<String> = entries.into_iter().map(|e| e.key.name).collect();
        Reply::text(format!("Registered models:\n{}", names.join("\n")))
    }

    /// One-step removal: no confirmation required
    fn remove(&self, name: &str) -> Reply {
        match self.store.remove(name) {
            Ok(_) => {
                info!(model = name, "Model removed from watchlist");
                Reply::text(format!("[{name}] removed from the watchlist."))
            }
            Err(CertwatchError::NotFound(_)) => {
                Reply::text(format!("[{name}] is not registered."))
            }
            Err(e) => {
                warn!(model = name, error = %e, "Watchlist remove failed");
                Reply::text("Could not update the watchlist. Please try again.")
            }
        }
    }

    async fn register(&self, name: &str, caller_target: &str) -> Reply {
        // Already registered: offer removal instead, via a confirmation token
        if self.store.contains(name) {
            let token = self
                .ledger
                .insert(PendingIntent::Remove(name.to_string()), caller_target);
            return Reply::with_actions(
                format!("[{name}] is already registered. Remove it from the watchlist?"),
                vec![
                    Action::button("remove", "Remove", &token),
                    self.cancel_button(caller_target),
                ],
            );
        }

        let candidates = match self.lookup.lookup(name).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(model = name, error = %e, "Registry lookup failed on command path");
                return Reply::text("The certification registry is unreachable. Please try again later.");
            }
        };

        match classify(name, candidates) {
            Resolution::NoExactResult => self.offer_bare(name, caller_target),
            Resolution::Exact(record) => self.offer_record(record, caller_target),
            Resolution::Ambiguous(candidates) => self.disambiguate(name, candidates, caller_target),
        }
    }

    /// Zero-candidate path: offer to watch a model the registry does not know yet
    fn offer_bare(&self, name: &str, caller_target: &str) -> Reply {
        if self.config.auto_confirm {
            return self.commit_bare(name, caller_target);
        }
        let token = self
            .ledger
            .insert(PendingIntent::RegisterBare(name.to_string()), caller_target);
        Reply::with_actions(
            format!(
                "No certification found for [{name}]. Register it to be alerted \
                 once its information is published?"
            ),
            vec![
                Action::button("new_register", "Register", &token),
                self.cancel_button(caller_target),
            ],
        )
    }

    /// Exact-match path: offer to watch the resolved record
    fn offer_record(&self, record: Record, caller_target: &str) -> Reply {
        if self.config.auto_confirm {
            return self.commit_record(record, caller_target);
        }
        let summary = record.summary();
        let token = self
            .ledger
            .insert(PendingIntent::RegisterRecord(record), caller_target);
        Reply::with_actions(
            format!("{summary}\n\nRegister to be alerted when this information changes?"),
            vec![
                Action::button("register", "Register", &token),
                self.cancel_button(caller_target),
            ],
        )
    }

    /// Multiple candidates: one button per candidate, bounded
    fn disambiguate(&self, name: &str, candidates: Vec<Record>, caller_target: &str) -> Reply {
        let mut actions = Vec::new();
        for candidate in candidates.into_iter().take(self.config.disambiguation_limit) {
            let label = candidate.name.clone();
            let token = self
                .ledger
                .insert(PendingIntent::RegisterRecord(candidate), caller_target);
            actions.push(Action::button("register", &label, &token));
        }
        actions.push(self.cancel_button(caller_target));
        Reply::with_actions(
            format!("Several models match [{name}]. Choose one to register:"),
            actions,
        )
    }

    fn cancel_button(&self, caller_target: &str) -> Action {
        let token = self.ledger.insert(PendingIntent::Cancel, caller_target);
        Action::button("close", "Close", &token)
    }

    /// Complete a pending action from the callback path
    pub fn complete_action(&self, token: &str) -> Reply {
        let action = match self.ledger.take(token) {
            Ok(action) => action,
            Err(e) => {
                info!(error = %e, "Callback token rejected");
                return Reply::text("That action has expired. Please run the command again.");
            }
        };

        match action.intent {
            PendingIntent::RegisterRecord(record) => {
                self.commit_record(record, &action.notify_target)
            }
            PendingIntent::RegisterBare(name) => self.commit_bare(&name, &action.notify_target),
            PendingIntent::Remove(name) => self.remove(&name),
            PendingIntent::Cancel => {
                Reply::text("Okay. Come back whenever you need certification alerts.")
            }
        }
    }

    fn commit_record(&self, record: Record, notify_target: &str) -> Reply {
        let name = record.name.clone();
        let entry = WatchEntry::from_record(record, notify_target);
        self.commit(entry, &name)
    }

    fn commit_bare(&self, name: &str, notify_target: &str) -> Reply {
        let entry = WatchEntry::bare(name, notify_target);
        self.commit(entry, name)
    }

    /// Registration confirmed earlier in the flow, so conflicts upsert
    fn commit(&self, entry: WatchEntry, name: &str) -> Reply {
        match self.store.add(entry, true) {
            Ok(()) => {
                info!(model = name, "Model registered on watchlist");
                Reply::text(format!("[{name}] registered. You will be alerted on changes."))
            }
            Err(CertwatchError::CapacityExceeded(max)) => {
                Reply::text(format!("The watchlist is full ({max} entries). Remove a model first."))
            }
            Err(e) => {
                warn!(model = name, error = %e, "Watchlist add failed");
                Reply::text("Could not update the watchlist. Please try again.")
            }
        }
    }
}

/// Apply the exactness rules to the lookup candidates
///
/// A single candidate counts only if its name equals the query exactly.
/// With several candidates, those with the same character length as the
/// query are preferred: exactly one survivor is treated as the single
/// candidate case, anything else asks the user to choose.
fn classify(name: &str, candidates: Vec<Record>) -> Resolution {
    let single = |record: Record| {
        if record.name == name {
            Resolution::Exact(record)
        } else {
            Resolution::NoExactResult
        }
    };

    match candidates.len() {
        0 => Resolution::NoExactResult,
        1 => match candidates.into_iter().next() {
            Some(candidate) => single(candidate),
            None => Resolution::NoExactResult,
        },
        _ => {
            let query_len = name.chars().count();
            let mut same_len: Vec<Record> = candidates
                .iter()
                .filter(|r| r.name.chars().count() == query_len)
                .cloned()
                .collect();
            if same_len.len() == 1 {
                single(same_len.remove(0))
            } else {
                Resolution::Ambiguous(candidates)
            }
        }
    }
}
