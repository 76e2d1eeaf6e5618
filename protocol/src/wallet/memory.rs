//! Scriptable in-memory wallet.
//!
//! Holds a balance, an optional passphrase lock and a transfer log, and can
//! be told to fail the next transfer. The state machine tests and the
//! end-to-end scenarios run against it.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Balances, ChainStatus, Wallet, WalletError, WalletErrorKind};

/// A transfer the wallet has made.
#[derive(Clone, Debug, PartialEq)]
pub struct Transfer {
    pub address: String,
    pub amount: f64,
    pub memo: String,
    pub txid: String,
}

#[derive(Debug)]
struct State {
    balance: f64,
    unconfirmed: f64,
    passphrase: Option<String>,
    locked: bool,
    unlock_attempts: u32,
    next_address: u64,
    transfers: Vec<Transfer>,
    fail_next_transfer: Option<WalletError>,
    fail_addresses: bool,
    status: ChainStatus,
}

#[derive(Debug)]
pub struct MemoryWallet {
    address_prefix: String,
    state: Mutex<State>,
}

impl MemoryWallet {
    /// An unlocked wallet holding `balance`. Addresses it hands out start
    /// with `address_prefix`.
    pub fn new(address_prefix: &str, balance: f64) -> Self {
        Self {
            address_prefix: address_prefix.to_string(),
            state: Mutex::new(State {
                balance,
                unconfirmed: 0.0,
                passphrase: None,
                locked: false,
                unlock_attempts: 0,
                next_address: 0,
                transfers: Vec::new(),
                fail_next_transfer: None,
                fail_addresses: false,
                status: ChainStatus { blocks: 1, peers: 8 },
            }),
        }
    }

    /// Locks the wallet behind `passphrase`.
    pub fn locked_with(self, passphrase: &str) -> Self {
        {
            let mut st = self.state.lock();
            st.passphrase = Some(passphrase.to_string());
            st.locked = true;
        }
        self
    }

    pub fn balance(&self) -> f64 {
        self.state.lock().balance
    }

    pub fn credit(&self, amount: f64) {
        self.state.lock().balance += amount;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().transfers.clone()
    }

    pub fn unlock_attempts(&self) -> u32 {
        self.state.lock().unlock_attempts
    }

    /// Makes the next [`Wallet::transfer`] fail with `err`.
    pub fn fail_next_transfer(&self, err: WalletError) {
        self.state.lock().fail_next_transfer = Some(err);
    }

    /// Makes address generation fail until called again with `false`.
    pub fn fail_addresses(&self, fail: bool) {
        self.state.lock().fail_addresses = fail;
    }

    /// Advances the simulated chain by one block.
    pub fn mine_block(&self) {
        self.state.lock().status.blocks += 1;
    }
}

#[async_trait]
impl Wallet for MemoryWallet {
    async fn unlocked_balance(&self) -> Result<f64, WalletError> {
        Ok(self.state.lock().balance)
    }

    async fn balances(&self) -> Result<Balances, WalletError> {
        let st = self.state.lock();
        Ok(Balances {
            confirmed: st.balance,
            unlocked: st.balance,
            unconfirmed: st.unconfirmed,
        })
    }

    async fn is_locked(&self) -> Result<bool, WalletError> {
        Ok(self.state.lock().locked)
    }

    async fn unlock(&self, passphrase: &str, _seconds: u64) -> Result<(), WalletError> {
        let mut st = self.state.lock();
        st.unlock_attempts += 1;
        let matches = st.passphrase.as_deref().map_or(true, |p| p == passphrase);
        if !matches {
            return Err(WalletError::new(
                WalletErrorKind::Locked,
                "The wallet passphrase entered was incorrect.",
            ));
        }
        st.locked = false;
        Ok(())
    }

    async fn new_receiving_address(&self) -> Result<String, WalletError> {
        let mut st = self.state.lock();
        if st.fail_addresses {
            return Err(WalletError::other("Keypool ran out"));
        }
        st.next_address += 1;
        Ok(format!("{}addr{:04}", self.address_prefix, st.next_address))
    }

    async fn transfer(&self, address: &str, amount: f64, memo: &str) -> Result<String, WalletError> {
        let mut st = self.state.lock();
        if let Some(err) = st.fail_next_transfer.take() {
            return Err(err);
        }
        if st.locked {
            return Err(WalletError::new(
                WalletErrorKind::Locked,
                "Error: Please enter the wallet passphrase with walletpassphrase first.",
            ));
        }
        if amount.is_nan() || amount <= 0.0 {
            return Err(WalletError::new(WalletErrorKind::InvalidAmount, "Invalid amount"));
        }
        if amount > st.balance {
            return Err(WalletError::new(
                WalletErrorKind::InsufficientFunds,
                "Insufficient funds",
            ));
        }
        st.balance -= amount;
        let txid = format!("{:064x}", st.transfers.len() + 1);
        st.transfers.push(Transfer {
            address: address.to_string(),
            amount,
            memo: memo.to_string(),
            txid: txid.clone(),
        });
        Ok(txid)
    }

    async fn chain_status(&self) -> Result<ChainStatus, WalletError> {
        Ok(self.state.lock().status)
    }
}
