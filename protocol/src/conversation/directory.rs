//! Session directory.
//!
//! Every send the user started in this conversation, keyed by uuid and kept
//! after it finishes, plus a receipt for every transfer the peer reported.
//! `/list` and `/txid` read from here.

use std::collections::HashMap;

use chrono::{DateTime, Local};

use super::send::{SendState, SendTransaction};
use crate::packet::TxidInf;

/// A transfer the peer reported making to us.
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt {
    pub uuid: String,
    pub coin: String,
    pub amount: String,
    pub address: String,
    pub txid: String,
    pub at: DateTime<Local>,
}

impl Receipt {
    pub fn from_txid_inf(inf: &TxidInf) -> Self {
        Self {
            uuid: inf.uuid.clone(),
            coin: inf.coin.clone(),
            amount: inf.amount.clone(),
            address: inf.addr.clone(),
            txid: inf.txid.clone(),
            at: Local::now(),
        }
    }
}

/// Direction of a [`HistoryLine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// One line of `/list` output.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryLine {
    pub direction: Direction,
    pub at: DateTime<Local>,
    pub coin: String,
    pub amount: String,
    pub address: String,
    pub txid: String,
}

impl HistoryLine {
    pub fn render(&self) -> String {
        let tag = match self.direction {
            Direction::Sent => "TX",
            Direction::Received => "RX",
        };
        format!(
            "{tag}: {} {} {} {} {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.coin,
            self.amount,
            self.address,
            self.txid
        )
    }
}

#[derive(Debug, Default)]
pub struct SessionDirectory {
    sends: HashMap<String, SendTransaction>,
    order: Vec<String>,
    receipts: Vec<Receipt>,
    last_txid: Option<String>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new send.
    ///
    /// # Panics
    ///
    /// If a send with the same uuid exists. Uuids are generated locally, so a
    /// collision is a bug.
    pub fn insert(&mut self, tx: SendTransaction) -> &mut SendTransaction {
        let uuid = tx.uuid.clone();
        assert!(
            !self.sends.contains_key(&uuid),
            "duplicate send uuid {uuid}"
        );
        self.order.push(uuid.clone());
        self.sends.entry(uuid).or_insert(tx)
    }

    pub fn get(&self, uuid: &str) -> Option<&SendTransaction> {
        self.sends.get(uuid)
    }

    pub fn get_mut(&mut self, uuid: &str) -> Option<&mut SendTransaction> {
        self.sends.get_mut(uuid)
    }

    /// The send currently blocked on a passphrase prompt, if any.
    pub fn awaiting_passphrase(&mut self) -> Option<&mut SendTransaction> {
        self.sends.values_mut().find(|tx| tx.is_awaiting_passphrase())
    }

    /// Sends in the order they were started.
    pub fn sends(&self) -> impl Iterator<Item = &SendTransaction> {
        self.order.iter().filter_map(|u| self.sends.get(u))
    }

    pub fn len(&self) -> usize {
        self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }

    pub fn record_receipt(&mut self, receipt: Receipt) {
        self.last_txid = Some(receipt.txid.clone());
        self.receipts.push(receipt);
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Remembers the most recent transaction id seen in either direction.
    pub fn note_txid(&mut self, txid: impl Into<String>) {
        self.last_txid = Some(txid.into());
    }

    pub fn last_txid(&self) -> Option<&str> {
        self.last_txid.as_deref()
    }

    /// Completed sends and receipts, oldest first, optionally restricted to
    /// one coin symbol.
    pub fn history(&self, coin: Option<&str>) -> Vec<HistoryLine> {
        let wanted = |sym: &str| coin.map_or(true, |c| c.eq_ignore_ascii_case(sym));

        let sent = self
            .sends()
            .filter(|tx| tx.state() == SendState::Complete && wanted(&tx.symbol))
            .filter_map(|tx| {
                Some(HistoryLine {
                    direction: Direction::Sent,
                    at: tx.finished_at?,
                    coin: tx.symbol.clone(),
                    amount: crate::wallet::format_amount(tx.amount()),
                    address: tx.address.clone()?,
                    txid: tx.txid.clone()?,
                })
            });
        let received = self
            .receipts
            .iter()
            .filter(|r| wanted(&r.coin))
            .map(|r| HistoryLine {
                direction: Direction::Received,
                at: r.at,
                coin: r.coin.clone(),
                amount: r.amount.clone(),
                address: r.address.clone(),
                txid: r.txid.clone(),
            });

        let mut lines: Vec<_> = sent.chain(received).collect();
        lines.sort_by_key(|l| l.at);
        lines
    }
}
