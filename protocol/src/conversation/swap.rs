//! # Swap Handshake
//!
//! Two parties trade one coin for another with no escrow. The proposer
//! offers `x A for y B`; the acceptor checks it can pay `y B`; the proposer
//! confirms with `/execute`, the parties trade receiving addresses, and each
//! side pays once it has the other's address (proposer first).
//!
//! ```text
//!   proposer                                      acceptor
//!   Idle ──/swap──► Proposed  ── swapInf ──►     Idle ──► ProposedRemote
//!   Proposed ──/execute──► ExecuteRequested ── swapReq ──►
//!                               ◄── swapRes ──   ProposedRemote ──► AwaitingTransfer
//!   pays x A, resets     ── txidInf ──►          pays y B, resets
//! ```
//!
//! There is one slot per conversation. A new proposal in either direction
//! cancels whatever was pending. Every stored view is local: `give` is what
//! this side pays, `take` is what it receives, so the acceptor stores the
//! proposal reversed.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{check_balance, parse_amount, validate_amount, Env, Timeout};
use crate::config::{
    REFUSAL_SENTINEL, SWAP_EXECUTE_TIMEOUT, SWAP_PROPOSAL_TIMEOUT, TRANSFER_MEMO,
};
use crate::error::ProtocolError;
use crate::packet::{Payload, SwapInf, SwapReq, SwapRes, TxidInf};
use crate::scheduler::TimerHandle;
use crate::wallet::{format_amount, CoinId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapRole {
    Proposer,
    Acceptor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwapState {
    #[default]
    Idle,
    /// Proposer sent `swapInf`, waiting for the local `/execute`.
    Proposed,
    /// Proposer sent `swapReq`, waiting for `swapRes`.
    ExecuteRequested,
    /// Acceptor holds a valid proposal, waiting for `swapReq`.
    ProposedRemote,
    /// Acceptor answered `swapReq`, waiting for the proposer's `txidInf`.
    AwaitingTransfer,
}

impl SwapState {
    pub fn role(self) -> Option<SwapRole> {
        match self {
            SwapState::Idle => None,
            SwapState::Proposed | SwapState::ExecuteRequested => Some(SwapRole::Proposer),
            SwapState::ProposedRemote | SwapState::AwaitingTransfer => Some(SwapRole::Acceptor),
        }
    }
}

/// One side of a swap from the local point of view.
#[derive(Clone, Debug, PartialEq)]
pub struct Leg {
    pub coin: CoinId,
    pub symbol: String,
    pub amount: f64,
}

#[derive(Debug, Default)]
pub struct SwapSlot {
    state: SwapState,
    uuid: String,
    give: Option<Leg>,
    take: Option<Leg>,
    /// Where our `give` leg must be paid. Acceptor only.
    counter_address: Option<String>,
    timer: Option<TimerHandle>,
}

impl SwapSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    pub fn role(&self) -> Option<SwapRole> {
        self.state.role()
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn give(&self) -> Option<&Leg> {
        self.give.as_ref()
    }

    pub fn take(&self) -> Option<&Leg> {
        self.take.as_ref()
    }

    pub fn counter_address(&self) -> Option<&str> {
        self.counter_address.as_deref()
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn is_idle(&self) -> bool {
        self.state == SwapState::Idle
    }

    // -----------------------------------------------------------------------
    // Proposer
    // -----------------------------------------------------------------------

    /// `/swap x A for y B`: offer to pay `x A` in exchange for `y B`.
    pub async fn propose(
        &mut self,
        env: &mut Env<'_>,
        amount_give: &str,
        symbol_give: &str,
        amount_take: &str,
        symbol_take: &str,
    ) -> Result<(), ProtocolError> {
        self.reset(env);

        let Some(give) = env.resolve(symbol_give) else {
            return Ok(());
        };
        let Some(take) = env.resolve(symbol_take) else {
            return Ok(());
        };
        let amounts = parse_amount(amount_give, "swap")
            .and_then(|g| Ok((g, parse_amount(amount_take, "swap")?)));
        let (x, y) = match amounts {
            Ok(pair) => pair,
            Err(e) => return reject(env, e),
        };
        match env.coin(give).wallet.unlocked_balance().await {
            Ok(balance) => {
                if let Err(e) = check_balance(x, balance, "swap") {
                    return reject(env, e);
                }
            }
            Err(e) => return reject(env, e.into()),
        }

        let give = leg(env, give, x);
        let take = leg(env, take, y);
        let uuid = Uuid::new_v4().to_string();
        env.send(Payload::SwapInf(SwapInf {
            uuid: uuid.clone(),
            coin_give: give.symbol.clone(),
            amount_give: x,
            coin_take: take.symbol.clone(),
            amount_take: y,
        }))
        .await?;

        info!(%uuid, give = %give.symbol, take = %take.symbol, "swap proposed");
        self.uuid = uuid;
        self.give = Some(give);
        self.take = Some(take);
        self.arm(env, SWAP_PROPOSAL_TIMEOUT);
        self.state = SwapState::Proposed;
        Ok(())
    }

    /// `/execute`: ask the acceptor for its address and hand over ours.
    pub async fn execute(&mut self, env: &mut Env<'_>) -> Result<(), ProtocolError> {
        if self.state != SwapState::Proposed {
            env.log.system("No swap available to execute");
            return Ok(());
        }
        self.disarm(env);
        let Some(take) = self.take.clone() else {
            self.reset(env);
            return Ok(());
        };

        let address = match env.coin(take.coin).wallet.new_receiving_address().await {
            Ok(a) => a,
            Err(e) => {
                self.reset(env);
                return reject(env, e.into());
            }
        };
        let sent = env
            .send(Payload::SwapReq(SwapReq {
                uuid: self.uuid.clone(),
                coin_give: take.symbol.clone(),
                addr_give: address,
            }))
            .await;
        if let Err(e) = sent {
            self.reset(env);
            return Err(e);
        }

        self.arm(env, SWAP_EXECUTE_TIMEOUT);
        self.state = SwapState::ExecuteRequested;
        Ok(())
    }

    /// The acceptor's `swapRes`. Pays our leg unless refused, then resets.
    /// Returns the txid of the transfer made, if any.
    pub async fn on_response(
        &mut self,
        env: &mut Env<'_>,
        res: &SwapRes,
    ) -> Result<Option<String>, ProtocolError> {
        if self.state != SwapState::ExecuteRequested {
            debug!(uuid = %res.uuid, state = ?self.state, "swapRes without execute ignored");
            return Ok(None);
        }
        let refused = res.addr_take == REFUSAL_SENTINEL;
        if !refused && res.uuid != self.uuid {
            debug!(uuid = %res.uuid, expected = %self.uuid, "swapRes for another swap ignored");
            return Ok(None);
        }
        let Some(give) = self.give.clone() else {
            self.reset(env);
            return Ok(None);
        };
        self.reset(env);

        if refused {
            env.log.system(format!(
                "Other party is unable or unwilling to receive swapped {}",
                give.symbol
            ));
            return Ok(None);
        }
        assert!(
            res.coin_take.eq_ignore_ascii_case(&give.symbol),
            "swapRes coin {} does not match the {} we give",
            res.coin_take,
            give.symbol
        );
        pay(env, &res.uuid, &give, &res.addr_take).await
    }

    // -----------------------------------------------------------------------
    // Acceptor
    // -----------------------------------------------------------------------

    /// The peer's `swapInf`. Accepted silently when we can pay the side they
    /// want to take; otherwise the reason is logged and the slot stays idle.
    pub async fn on_proposal(&mut self, env: &mut Env<'_>, inf: &SwapInf) -> Result<(), ProtocolError> {
        env.log.system(format!(
            "Swap proposed : {} {} for {} {}",
            inf.amount_give, inf.coin_give, inf.amount_take, inf.coin_take
        ));
        self.reset(env);

        let Some(their_give) = env.resolve(&inf.coin_give) else {
            return Ok(());
        };
        let Some(their_take) = env.resolve(&inf.coin_take) else {
            return Ok(());
        };
        let amounts = validate_amount(inf.amount_give, "swap")
            .and_then(|g| Ok((g, validate_amount(inf.amount_take, "swap")?)));
        let (x, y) = match amounts {
            Ok(pair) => pair,
            Err(e) => return reject(env, e),
        };
        // We pay what they take.
        match env.coin(their_take).wallet.unlocked_balance().await {
            Ok(balance) => {
                if let Err(e) = check_balance(y, balance, "swap") {
                    return reject(env, e);
                }
            }
            Err(e) => return reject(env, e.into()),
        }

        self.uuid = inf.uuid.clone();
        self.give = Some(leg(env, their_take, y));
        self.take = Some(leg(env, their_give, x));
        self.arm(env, SWAP_PROPOSAL_TIMEOUT);
        self.state = SwapState::ProposedRemote;
        info!(uuid = %self.uuid, "swap proposal accepted");
        Ok(())
    }

    /// The proposer's `swapReq`. Anything we are not waiting for gets the
    /// refusal sentinel.
    pub async fn on_request(&mut self, env: &mut Env<'_>, req: &SwapReq) -> Result<(), ProtocolError> {
        if self.state != SwapState::ProposedRemote || req.uuid != self.uuid {
            debug!(uuid = %req.uuid, state = ?self.state, "unsolicited swapReq refused");
            return env.send(refusal(String::new(), String::new())).await;
        }
        let (Some(give), Some(take)) = (self.give.clone(), self.take.clone()) else {
            self.reset(env);
            return env.send(refusal(String::new(), String::new())).await;
        };
        assert!(
            req.coin_give.eq_ignore_ascii_case(&give.symbol),
            "swapReq coin {} does not match the {} we give",
            req.coin_give,
            give.symbol
        );
        self.counter_address = Some(req.addr_give.clone());

        let address = match env.coin(take.coin).wallet.new_receiving_address().await {
            Ok(a) => a,
            Err(e) => {
                env.log.system(e.to_string());
                self.reset(env);
                return env.send(refusal(req.uuid.clone(), take.symbol)).await;
            }
        };
        self.disarm(env);
        let sent = env
            .send(Payload::SwapRes(SwapRes {
                uuid: self.uuid.clone(),
                coin_take: take.symbol.clone(),
                addr_take: address,
            }))
            .await;
        if let Err(e) = sent {
            self.reset(env);
            return Err(e);
        }

        self.arm(env, SWAP_PROPOSAL_TIMEOUT);
        self.state = SwapState::AwaitingTransfer;
        Ok(())
    }

    /// A `txidInf` from the peer. When it is the proposer's payment for the
    /// pending swap we pay our leg and reset. Returns the txid of the
    /// transfer made, if any.
    pub async fn on_transfer(
        &mut self,
        env: &mut Env<'_>,
        inf: &TxidInf,
    ) -> Result<Option<String>, ProtocolError> {
        if self.state != SwapState::AwaitingTransfer || inf.uuid != self.uuid {
            return Ok(None);
        }
        let give = self.give.clone();
        let address = self.counter_address.clone();
        if let Some(take) = &self.take {
            if !inf.coin.eq_ignore_ascii_case(&take.symbol) {
                warn!(uuid = %inf.uuid, coin = %inf.coin, expected = %take.symbol, "swap paid in an unexpected coin");
            }
        }
        self.reset(env);

        match (give, address) {
            (Some(give), Some(address)) => pay(env, &inf.uuid, &give, &address).await,
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Handles the slot's alarm. Stale alarms are ignored.
    pub fn on_timeout(&mut self, env: &mut Env<'_>, handle: TimerHandle) {
        if self.timer != Some(handle) {
            debug!(state = ?self.state, "stale swap timeout ignored");
            return;
        }
        self.timer = None;
        let msg = match self.state {
            SwapState::Idle => return,
            SwapState::Proposed => format!(
                "No /execute within {} seconds - swap cancelled",
                SWAP_PROPOSAL_TIMEOUT.as_secs()
            ),
            SwapState::ExecuteRequested => "No response from other party - swap cancelled".into(),
            SwapState::ProposedRemote | SwapState::AwaitingTransfer => {
                "Swap not completed by other party - swap cancelled".into()
            }
        };
        info!(uuid = %self.uuid, state = ?self.state, "swap timed out");
        env.log.system(msg);
        self.reset(env);
    }

    /// Cancels the alarm and empties the slot.
    pub fn reset(&mut self, env: &mut Env<'_>) {
        self.disarm(env);
        self.state = SwapState::Idle;
        self.uuid.clear();
        self.give = None;
        self.take = None;
        self.counter_address = None;
    }

    fn arm(&mut self, env: &mut Env<'_>, after: std::time::Duration) {
        self.disarm(env);
        self.timer = Some(env.timers.arm(after, Timeout::Swap));
    }

    fn disarm(&mut self, env: &mut Env<'_>) {
        if let Some(h) = self.timer.take() {
            env.timers.cancel(h);
        }
    }
}

fn leg(env: &Env<'_>, coin: CoinId, amount: f64) -> Leg {
    Leg {
        coin,
        symbol: env.coin(coin).symbol.clone(),
        amount,
    }
}

fn refusal(uuid: String, coin_take: String) -> Payload {
    Payload::SwapRes(SwapRes {
        uuid,
        coin_take,
        addr_take: REFUSAL_SENTINEL.to_string(),
    })
}

fn reject(env: &mut Env<'_>, err: ProtocolError) -> Result<(), ProtocolError> {
    env.log.system(err.to_string());
    Ok(())
}

/// Pays `leg` to `address` and tells the peer. Wallet errors are logged.
async fn pay(
    env: &mut Env<'_>,
    uuid: &str,
    leg: &Leg,
    address: &str,
) -> Result<Option<String>, ProtocolError> {
    let txid = match env
        .coin(leg.coin)
        .wallet
        .transfer(address, leg.amount, TRANSFER_MEMO)
        .await
    {
        Ok(txid) => txid,
        Err(e) => {
            warn!(%uuid, coin = %leg.symbol, error = %e, "swap transfer failed");
            env.log.system(e.to_string());
            return Ok(None);
        }
    };

    let amount = format_amount(leg.amount);
    env.log
        .system(format!("{amount} {} sent to {address}", leg.symbol));
    info!(%uuid, coin = %leg.symbol, %amount, %txid, "swap leg paid");
    env.send(Payload::TxidInf(TxidInf {
        uuid: uuid.to_string(),
        coin: leg.symbol.clone(),
        amount,
        addr: address.to_string(),
        txid: txid.clone(),
    }))
    .await?;
    Ok(Some(txid))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::conversation::testkit::{inbox, pair, Side};

    fn only(packets: Vec<crate::packet::Packet>) -> Payload {
        assert_eq!(packets.len(), 1, "{packets:?}");
        packets.into_iter().next().unwrap().payload
    }

    async fn proposal(side: &mut Side) -> SwapInf {
        let Payload::SwapInf(inf) = only(inbox(side).await) else {
            panic!("expected swapInf");
        };
        inf
    }

    #[tokio::test]
    async fn acceptor_stores_the_reversed_view() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();
        let mut bob = SwapSlot::new();

        alice
            .propose(&mut p.alice.env(), "1", "ecc", "0.5", "BTC")
            .await
            .unwrap();
        assert_eq!(alice.state(), SwapState::Proposed);
        assert_eq!(alice.give().unwrap().symbol, "ecc");
        assert_eq!(alice.take().unwrap().symbol, "btc");

        let inf = proposal(&mut p.bob).await;
        assert_eq!((inf.coin_give.as_str(), inf.amount_give), ("ecc", 1.0));
        assert_eq!((inf.coin_take.as_str(), inf.amount_take), ("btc", 0.5));

        bob.on_proposal(&mut p.bob.env(), &inf).await.unwrap();
        assert_eq!(bob.state(), SwapState::ProposedRemote);
        assert_eq!(bob.role(), Some(SwapRole::Acceptor));
        assert_eq!(bob.uuid(), inf.uuid);
        let give = bob.give().unwrap();
        let take = bob.take().unwrap();
        assert_eq!((give.symbol.as_str(), give.amount), ("btc", 0.5));
        assert_eq!((take.symbol.as_str(), take.amount), ("ecc", 1.0));
        assert!(p.bob.log.has_system("Swap proposed : 1 ecc for 0.5 btc"));
    }

    #[tokio::test]
    async fn acceptor_checks_the_balance_it_pays_from() {
        let mut p = pair().await;
        let mut bob = SwapSlot::new();

        // Bob holds 5 ECC: paying for 8 ECC is not his problem.
        let affordable = SwapInf {
            uuid: "s1".into(),
            coin_give: "ecc".into(),
            amount_give: 8.0,
            coin_take: "btc".into(),
            amount_take: 1.0,
        };
        bob.on_proposal(&mut p.bob.env(), &affordable).await.unwrap();
        assert_eq!(bob.state(), SwapState::ProposedRemote);

        // Bob holds 2 BTC and would have to pay 3.
        let too_much = SwapInf {
            uuid: "s2".into(),
            coin_give: "ecc".into(),
            amount_give: 1.0,
            coin_take: "btc".into(),
            amount_take: 3.0,
        };
        bob.on_proposal(&mut p.bob.env(), &too_much).await.unwrap();
        assert!(bob.is_idle());
        assert_eq!(
            p.bob.log.last_system(),
            Some("Invalid swap amount - must be less than current balance = 2.000000")
        );
        assert!(p.bob.timers.is_empty());
        assert!(inbox(&mut p.alice).await.is_empty());
    }

    #[tokio::test]
    async fn new_proposal_supersedes_and_cancels_the_old_timer() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();

        alice
            .propose(&mut p.alice.env(), "1", "ecc", "0.5", "btc")
            .await
            .unwrap();
        let first_uuid = alice.uuid().to_string();
        let first_timer = alice.timer().unwrap();

        alice
            .propose(&mut p.alice.env(), "2", "ecc", "0.1", "btc")
            .await
            .unwrap();
        assert_ne!(alice.uuid(), first_uuid);
        assert!(!p.alice.timers.is_armed(first_timer));
        assert!(!p.alice.timers.cancel(first_timer));
        assert_eq!(p.alice.timers.len(), 1);
        assert_eq!(alice.give().unwrap().amount, 2.0);
    }

    #[tokio::test]
    async fn invalid_proposals_leave_the_slot_idle() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();
        for (x, a, y, b, msg) in [
            ("1", "doge", "1", "btc", "Unknown coin symbol: doge"),
            ("one", "ecc", "1", "btc", "Invalid swap amount - number expected"),
            ("1", "ecc", "-2", "btc", "Invalid swap amount - must be greater than zero"),
            ("10", "ecc", "1", "btc", "Invalid swap amount - must be less than current balance = 10.000000"),
        ] {
            alice.propose(&mut p.alice.env(), x, a, y, b).await.unwrap();
            assert!(alice.is_idle());
            assert_eq!(p.alice.log.last_system(), Some(msg));
        }
        assert!(inbox(&mut p.bob).await.is_empty());
    }

    #[tokio::test]
    async fn full_swap_pays_both_legs() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();
        let mut bob = SwapSlot::new();

        alice
            .propose(&mut p.alice.env(), "1", "ecc", "0.5", "btc")
            .await
            .unwrap();
        let inf = proposal(&mut p.bob).await;
        bob.on_proposal(&mut p.bob.env(), &inf).await.unwrap();

        alice.execute(&mut p.alice.env()).await.unwrap();
        assert_eq!(alice.state(), SwapState::ExecuteRequested);
        let Payload::SwapReq(req) = only(inbox(&mut p.bob).await) else {
            panic!("expected swapReq");
        };
        assert_eq!(req.coin_give, "btc");
        assert_eq!(req.addr_give, "1addr0001");

        bob.on_request(&mut p.bob.env(), &req).await.unwrap();
        assert_eq!(bob.state(), SwapState::AwaitingTransfer);
        assert_eq!(bob.counter_address(), Some("1addr0001"));
        let Payload::SwapRes(res) = only(inbox(&mut p.alice).await) else {
            panic!("expected swapRes");
        };
        assert_eq!(res.coin_take, "ecc");
        assert_eq!(res.addr_take, "Eaddr0001");

        let txid = alice.on_response(&mut p.alice.env(), &res).await.unwrap();
        assert!(alice.is_idle());
        assert!(p.alice.timers.is_empty());
        assert_eq!(p.alice.ecc.transfers()[0].address, "Eaddr0001");
        assert_eq!(p.alice.ecc.transfers()[0].amount, 1.0);
        assert_eq!(txid.as_deref(), Some(p.alice.ecc.transfers()[0].txid.as_str()));

        let Payload::TxidInf(paid) = only(inbox(&mut p.bob).await) else {
            panic!("expected txidInf");
        };
        assert_eq!(paid.amount, "1.000000");
        bob.on_transfer(&mut p.bob.env(), &paid).await.unwrap();
        assert!(bob.is_idle());
        assert!(p.bob.timers.is_empty());
        assert_eq!(p.bob.btc.transfers()[0].address, "1addr0001");
        assert_eq!(p.bob.btc.transfers()[0].amount, 0.5);

        let Payload::TxidInf(back) = only(inbox(&mut p.alice).await) else {
            panic!("expected txidInf");
        };
        assert_eq!(back.uuid, paid.uuid);
        assert_eq!(back.coin, "btc");
        assert_eq!(back.amount, "0.500000");
    }

    #[tokio::test]
    async fn unsolicited_request_gets_refusal_and_proposer_resets() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();
        let mut bob = SwapSlot::new();

        alice
            .propose(&mut p.alice.env(), "1", "ecc", "0.5", "btc")
            .await
            .unwrap();
        // Bob never saw the proposal.
        inbox(&mut p.bob).await;
        alice.execute(&mut p.alice.env()).await.unwrap();
        let Payload::SwapReq(req) = only(inbox(&mut p.bob).await) else {
            panic!("expected swapReq");
        };
        bob.on_request(&mut p.bob.env(), &req).await.unwrap();

        let Payload::SwapRes(res) = only(inbox(&mut p.alice).await) else {
            panic!("expected swapRes");
        };
        assert_eq!(res.uuid, "");
        assert_eq!(res.coin_take, "");
        assert_eq!(res.addr_take, "0");

        alice.on_response(&mut p.alice.env(), &res).await.unwrap();
        assert!(alice.is_idle());
        assert!(p.alice.timers.is_empty());
        assert!(p.alice.ecc.transfers().is_empty());
        assert_eq!(
            p.alice.log.last_system(),
            Some("Other party is unable or unwilling to receive swapped ecc")
        );
    }

    #[tokio::test]
    async fn execute_without_proposal() {
        let mut p = pair().await;
        let mut bob = SwapSlot::new();
        bob.execute(&mut p.bob.env()).await.unwrap();
        assert_eq!(p.bob.log.last_system(), Some("No swap available to execute"));
        assert!(inbox(&mut p.alice).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn proposal_times_out_after_sixty_seconds() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();
        let start = Instant::now();
        alice
            .propose(&mut p.alice.env(), "1", "ecc", "0.5", "btc")
            .await
            .unwrap();

        assert!(p
            .alice
            .timers
            .pop_due(start + Duration::from_secs(59))
            .is_none());
        let (handle, t) = p.alice.timers.pop_due(start + SWAP_PROPOSAL_TIMEOUT).unwrap();
        assert_eq!(t, Timeout::Swap);
        alice.on_timeout(&mut p.alice.env(), handle);
        assert!(alice.is_idle());
        assert_eq!(
            p.alice.log.last_system(),
            Some("No /execute within 60 seconds - swap cancelled")
        );

        // Firing the same handle again does nothing.
        let before = p.alice.log.len();
        alice.on_timeout(&mut p.alice.env(), handle);
        assert_eq!(p.alice.log.len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_handle_from_superseded_swap_is_ignored() {
        let mut p = pair().await;
        let mut alice = SwapSlot::new();
        alice
            .propose(&mut p.alice.env(), "1", "ecc", "0.5", "btc")
            .await
            .unwrap();
        let stale = alice.timer().unwrap();
        alice.execute(&mut p.alice.env()).await.unwrap();

        alice.on_timeout(&mut p.alice.env(), stale);
        assert_eq!(alice.state(), SwapState::ExecuteRequested);

        let (handle, _) = p
            .alice
            .timers
            .pop_due(Instant::now() + SWAP_EXECUTE_TIMEOUT)
            .unwrap();
        alice.on_timeout(&mut p.alice.env(), handle);
        assert_eq!(
            p.alice.log.last_system(),
            Some("No response from other party - swap cancelled")
        );
    }
}
