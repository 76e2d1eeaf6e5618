//! # Send Handshake
//!
//! Paying the peer without knowing any of their addresses: ask them for
//! one, pay it, tell them the txid.
//!
//! ```text
//!   Initial ──start──► Checking ──(unlocked)──► AddressRequested ──addrRes──► Complete
//!                       │    ▲                        │
//!                       │    └─passphrase─┐           ├─ "0" / wallet error / 10 s
//!                       │     (≤ 3 tries) │           ▼
//!                       └── validation ───┴──────►  Failed
//! ```
//!
//! A transaction never leaves a terminal state. The dispatcher only hands
//! an `addrRes` to a machine waiting for one, so a duplicate or late reply
//! never reaches [`SendTransaction::on_address`].

use chrono::{DateTime, Local};
use tracing::{debug, info};

use super::transcript::Prompt;
use super::{check_balance, parse_amount, Env, Timeout};
use crate::config::{
    ADDRESS_RESPONSE_TIMEOUT, ADDRESS_TYPE, REFUSAL_SENTINEL, TRANSFER_MEMO, UNLOCK_DURATION_SECS,
    UNLOCK_RETRY_LIMIT,
};
use crate::error::ProtocolError;
use crate::packet::{AddrReq, AddrRes, Payload, TxidInf};
use crate::scheduler::TimerHandle;
use crate::wallet::{format_amount, CoinId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendState {
    Initial,
    Checking,
    AddressRequested,
    Complete,
    Failed,
}

/// One outstanding (or finished) payment to the peer.
#[derive(Debug)]
pub struct SendTransaction {
    pub uuid: String,
    pub coin: CoinId,
    pub symbol: String,
    /// Amount as the user typed it.
    pub amount_text: String,
    amount: f64,
    pub address: Option<String>,
    pub txid: Option<String>,
    state: SendState,
    unlock_attempts: u32,
    awaiting_passphrase: bool,
    pub error: Option<String>,
    timer: Option<TimerHandle>,
    pub finished_at: Option<DateTime<Local>>,
}

impl SendTransaction {
    pub fn new(uuid: impl Into<String>, coin: CoinId, symbol: &str, amount_text: &str) -> Self {
        Self {
            uuid: uuid.into(),
            coin,
            symbol: symbol.to_string(),
            amount_text: amount_text.to_string(),
            amount: 0.0,
            address: None,
            txid: None,
            state: SendState::Initial,
            unlock_attempts: 0,
            awaiting_passphrase: false,
            error: None,
            timer: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn unlock_attempts(&self) -> u32 {
        self.unlock_attempts
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SendState::Complete | SendState::Failed)
    }

    pub fn is_awaiting_address(&self) -> bool {
        self.state == SendState::AddressRequested
    }

    pub fn is_awaiting_passphrase(&self) -> bool {
        self.state == SendState::Checking && self.awaiting_passphrase
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// `Initial → Checking`: validates the request, then unlocks or asks
    /// for the address.
    pub async fn start(&mut self, env: &mut Env<'_>) -> Result<(), ProtocolError> {
        assert_eq!(self.state, SendState::Initial, "send {} started twice", self.uuid);
        self.state = SendState::Checking;

        let amount = match parse_amount(&self.amount_text, "send") {
            Ok(a) => a,
            Err(e) => return self.fail(env, e),
        };
        self.amount = amount;

        let wallet = &env.coin(self.coin).wallet;
        let balance = match wallet.unlocked_balance().await {
            Ok(b) => b,
            Err(e) => return self.fail(env, e.into()),
        };
        if let Err(e) = check_balance(amount, balance, "send") {
            return self.fail(env, e);
        }

        self.unlock_or_request(env).await
    }

    /// Answer to the passphrase prompt. `None` means the user cancelled.
    pub async fn passphrase(
        &mut self,
        env: &mut Env<'_>,
        passphrase: Option<String>,
    ) -> Result<(), ProtocolError> {
        assert!(
            self.is_awaiting_passphrase(),
            "send {} got a passphrase in {:?}",
            self.uuid,
            self.state
        );
        self.awaiting_passphrase = false;
        env.log.clear_prompt();

        let Some(passphrase) = passphrase else {
            let msg = format!("Wallet unlock cancelled: {}", self.symbol);
            return self.fail(env, ProtocolError::Validation(msg));
        };

        self.unlock_attempts += 1;
        let wallet = &env.coin(self.coin).wallet;
        if let Err(e) = wallet.unlock(&passphrase, UNLOCK_DURATION_SECS).await {
            debug!(uuid = %self.uuid, error = %e, "unlock attempt failed");
        }
        self.unlock_or_request(env).await
    }

    /// Re-checks the lock, which may have changed since the last look.
    async fn unlock_or_request(&mut self, env: &mut Env<'_>) -> Result<(), ProtocolError> {
        let wallet = &env.coin(self.coin).wallet;
        let locked = match wallet.is_locked().await {
            Ok(l) => l,
            Err(e) => return self.fail(env, e.into()),
        };

        if locked {
            if self.unlock_attempts >= UNLOCK_RETRY_LIMIT {
                let msg = format!(
                    "Wallet unlock - {} attempts failed : {}",
                    self.unlock_attempts, self.symbol
                );
                return self.fail(env, ProtocolError::Validation(msg));
            }
            self.awaiting_passphrase = true;
            env.log.set_prompt(Prompt::Passphrase {
                uuid: self.uuid.clone(),
                symbol: self.symbol.clone(),
                attempt: self.unlock_attempts + 1,
                limit: UNLOCK_RETRY_LIMIT,
            });
            return Ok(());
        }

        self.request_address(env).await
    }

    /// `Checking → AddressRequested`.
    async fn request_address(&mut self, env: &mut Env<'_>) -> Result<(), ProtocolError> {
        let sent = env
            .send(Payload::AddrReq(AddrReq {
                uuid: self.uuid.clone(),
                coin: self.symbol.clone(),
                address_type: ADDRESS_TYPE.to_string(),
            }))
            .await;
        if let Err(e) = sent {
            self.fail(env, ProtocolError::Validation("/send cancelled".into()))?;
            return Err(e);
        }

        self.timer = Some(env.timers.arm(
            ADDRESS_RESPONSE_TIMEOUT,
            Timeout::AddressResponse {
                uuid: self.uuid.clone(),
            },
        ));
        self.state = SendState::AddressRequested;
        debug!(uuid = %self.uuid, coin = %self.symbol, "address requested");
        Ok(())
    }

    /// `AddressRequested → Complete | Failed` on the peer's `addrRes`.
    pub async fn on_address(&mut self, env: &mut Env<'_>, res: &AddrRes) -> Result<(), ProtocolError> {
        assert!(
            self.is_awaiting_address(),
            "send {} got addrRes in {:?}",
            self.uuid,
            self.state
        );
        assert_eq!(res.uuid, self.uuid, "addrRes routed to the wrong send");
        self.disarm(env);

        if res.addr == REFUSAL_SENTINEL {
            let msg = format!(
                "Other party is unable or unwilling to receive unsolicited sends of {}",
                self.symbol
            );
            return self.fail(env, ProtocolError::PeerRefusal(msg));
        }

        let wallet = &env.coin(self.coin).wallet;
        let txid = match wallet.transfer(&res.addr, self.amount, TRANSFER_MEMO).await {
            Ok(txid) => txid,
            Err(e) => return self.fail(env, e.into()),
        };

        let amount = format_amount(self.amount);
        self.address = Some(res.addr.clone());
        self.txid = Some(txid.clone());
        self.state = SendState::Complete;
        self.finished_at = Some(Local::now());
        env.log
            .system(format!("{amount} {} sent to {}", self.symbol, res.addr));
        info!(uuid = %self.uuid, coin = %self.symbol, %amount, %txid, "send complete");

        env.send(Payload::TxidInf(TxidInf {
            uuid: self.uuid.clone(),
            coin: self.symbol.clone(),
            amount,
            addr: res.addr.clone(),
            txid,
        }))
        .await
    }

    /// Handles this transaction's alarm. Stale alarms are ignored.
    pub fn on_timeout(&mut self, env: &mut Env<'_>, handle: TimerHandle) {
        if !self.is_awaiting_address() || self.timer != Some(handle) {
            debug!(uuid = %self.uuid, state = ?self.state, "stale send timeout ignored");
            return;
        }
        self.timer = None;
        let msg = "No response from other party - /send cancelled".to_string();
        self.record_failure(env, ProtocolError::Timeout(msg));
    }

    fn disarm(&mut self, env: &mut Env<'_>) {
        if let Some(h) = self.timer.take() {
            env.timers.cancel(h);
        }
    }

    /// Like [`record_failure`](Self::record_failure), for transitions that
    /// return a result: the failure is reported, not propagated.
    fn fail(&mut self, env: &mut Env<'_>, err: ProtocolError) -> Result<(), ProtocolError> {
        self.record_failure(env, err);
        Ok(())
    }

    /// Moves to `Failed` and writes the reason to the conversation.
    fn record_failure(&mut self, env: &mut Env<'_>, err: ProtocolError) {
        self.disarm(env);
        self.awaiting_passphrase = false;
        let msg = err.to_string();
        info!(uuid = %self.uuid, coin = %self.symbol, reason = %msg, "send failed");
        env.log.system(msg.clone());
        self.error = Some(msg);
        self.state = SendState::Failed;
        self.finished_at = Some(Local::now());
    }
}
