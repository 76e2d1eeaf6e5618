//! The conversation log.
//!
//! An append-only list of entries plus an index by party and uuid, so a
//! peer reusing one of our uuids can never reach our entry. Chat edits
//! rewrite an entry in place, so positions are stable for the life of the session and
//! a renderer can redraw just the entries that changed.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::REDACTION_GLYPH;

/// Who an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Party {
    /// Notices, command output, errors.
    System,
    /// Typed by the local user.
    Local,
    /// Received from the peer.
    Peer,
}

/// Delivery state of a local chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AckState {
    Pending,
    Acked,
    NotAcked,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatEntry {
    pub uuid: Option<String>,
    pub party: Party,
    pub text: String,
    pub ack: AckState,
    pub at: DateTime<Local>,
}

/// Something the front end must ask the user before the conversation can
/// continue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompt {
    /// Wallet passphrase for the send `uuid`.
    Passphrase {
        uuid: String,
        symbol: String,
        attempt: u32,
        limit: u32,
    },
}

impl Prompt {
    pub fn text(&self) -> String {
        match self {
            Prompt::Passphrase {
                symbol,
                attempt,
                limit,
                ..
            } => format!("Enter {symbol} wallet unlock passphrase ({attempt}/{limit}):"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
    index: HashMap<(Party, String), usize>,
    dirty: BTreeSet<usize>,
    prompt: Option<Prompt>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, uuid: Option<String>, party: Party, text: String, ack: AckState) -> usize {
        let pos = self.entries.len();
        // A repeated uuid keeps pointing at its first entry.
        if let Some(u) = &uuid {
            self.index.entry((party, u.clone())).or_insert(pos);
        }
        self.entries.push(ChatEntry {
            uuid,
            party,
            text,
            ack,
            at: Local::now(),
        });
        self.dirty.insert(pos);
        pos
    }

    /// Appends a system line.
    pub fn system(&mut self, text: impl Into<String>) -> usize {
        self.push(None, Party::System, text.into(), AckState::Acked)
    }

    /// Appends a command the user typed. Commands never go on the wire.
    pub fn command(&mut self, text: impl Into<String>) -> usize {
        self.push(None, Party::Local, text.into(), AckState::Acked)
    }

    /// Appends a local chat message awaiting acknowledgement.
    pub fn local(&mut self, uuid: &str, text: impl Into<String>) -> usize {
        self.push(Some(uuid.to_string()), Party::Local, text.into(), AckState::Pending)
    }

    /// Appends a message from the peer.
    pub fn peer(&mut self, uuid: &str, text: impl Into<String>) -> usize {
        self.push(Some(uuid.to_string()), Party::Peer, text.into(), AckState::Acked)
    }

    fn position(&self, uuid: &str, party: Party) -> Option<usize> {
        self.index.get(&(party, uuid.to_string())).copied()
    }

    /// Rewrites the text of `party`'s entry `uuid`. Returns its position,
    /// or `None` when there is no such entry.
    pub fn rewrite(&mut self, uuid: &str, party: Party, text: impl Into<String>) -> Option<usize> {
        let pos = self.position(uuid, party)?;
        self.entries[pos].text = text.into();
        if party == Party::Local {
            self.entries[pos].ack = AckState::Pending;
        }
        self.dirty.insert(pos);
        Some(pos)
    }

    /// Overwrites `party`'s entry `uuid` with a run of redaction glyphs the
    /// same length as its text.
    pub fn redact(&mut self, uuid: &str, party: Party) -> Option<usize> {
        let pos = self.position(uuid, party)?;
        let len = self.entries[pos].text.chars().count();
        self.rewrite(uuid, party, redaction(len))
    }

    /// Records the peer's acknowledgement of a local message.
    pub fn acknowledge(&mut self, uuid: &str, able: bool) -> bool {
        let Some(pos) = self.position(uuid, Party::Local) else {
            return false;
        };
        self.entries[pos].ack = if able {
            AckState::Acked
        } else {
            AckState::NotAcked
        };
        self.dirty.insert(pos);
        true
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks `uuid` up among our own messages first, then the peer's.
    pub fn find(&self, uuid: &str) -> Option<&ChatEntry> {
        self.position(uuid, Party::Local)
            .or_else(|| self.position(uuid, Party::Peer))
            .map(|pos| &self.entries[pos])
    }

    /// The most recent local chat message that can still be edited.
    pub fn last_local_message(&self) -> Option<&ChatEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.party == Party::Local && e.uuid.is_some())
    }

    /// Text of the most recent system line.
    pub fn last_system(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.party == Party::System)
            .map(|e| e.text.as_str())
    }

    /// Whether any system line contains `needle`.
    pub fn has_system(&self, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.party == Party::System && e.text.contains(needle))
    }

    /// Positions created or changed since the last call, in order.
    pub fn take_updates(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    /// Shows a prompt, replacing any earlier one.
    pub fn set_prompt(&mut self, prompt: Prompt) {
        self.system(prompt.text());
        self.prompt = Some(prompt);
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn clear_prompt(&mut self) -> Option<Prompt> {
        self.prompt.take()
    }
}

/// A run of redaction glyphs `len` characters long.
pub fn redaction(len: usize) -> String {
    std::iter::repeat(REDACTION_GLYPH).take(len).collect()
}
