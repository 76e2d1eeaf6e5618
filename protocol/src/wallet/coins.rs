//! The set of coins a node can talk about.
//!
//! Index 0 is the messaging coin: the chain whose daemon carries the packet
//! buffer, and the default for commands that take an optional symbol.

use std::fmt;
use std::sync::Arc;

use super::Wallet;

/// Position of a coin in its [`CoinRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoinId(usize);

impl CoinId {
    /// The messaging coin.
    pub const MESSAGING: CoinId = CoinId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One configured coin.
#[derive(Clone)]
pub struct Coin {
    /// Ticker as used on the wire, lower-case.
    pub symbol: String,
    /// Display name.
    pub name: String,
    pub wallet: Arc<dyn Wallet>,
}

impl fmt::Debug for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coin")
            .field("symbol", &self.symbol)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered, non-empty list of coins with case-insensitive lookup.
#[derive(Clone, Debug)]
pub struct CoinRegistry {
    coins: Vec<Coin>,
}

impl CoinRegistry {
    /// Creates a registry whose first coin is the messaging coin.
    pub fn new(symbol: &str, name: &str, wallet: Arc<dyn Wallet>) -> Self {
        let mut reg = Self { coins: Vec::new() };
        reg.push(symbol, name, wallet);
        reg
    }

    /// Adds a coin. A symbol already present is ignored.
    pub fn with_coin(mut self, symbol: &str, name: &str, wallet: Arc<dyn Wallet>) -> Self {
        if self.lookup(symbol).is_none() {
            self.push(symbol, name, wallet);
        }
        self
    }

    fn push(&mut self, symbol: &str, name: &str, wallet: Arc<dyn Wallet>) {
        self.coins.push(Coin {
            symbol: symbol.to_lowercase(),
            name: name.to_string(),
            wallet,
        });
    }

    /// Finds a coin by ticker, ignoring case.
    pub fn lookup(&self, symbol: &str) -> Option<CoinId> {
        self.coins
            .iter()
            .position(|c| c.symbol.eq_ignore_ascii_case(symbol.trim()))
            .map(CoinId)
    }

    /// # Panics
    ///
    /// Panics on an id from a different registry.
    pub fn get(&self, id: CoinId) -> &Coin {
        &self.coins[id.0]
    }

    pub fn messaging(&self) -> &Coin {
        &self.coins[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CoinId, &Coin)> {
        self.coins.iter().enumerate().map(|(i, c)| (CoinId(i), c))
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::MemoryWallet;

    fn registry() -> CoinRegistry {
        CoinRegistry::new("ECC", "ECCoin", Arc::new(MemoryWallet::new("E", 10.0)))
            .with_coin("btc", "Bitcoin", Arc::new(MemoryWallet::new("1", 1.0)))
            .with_coin("BTC", "Duplicate", Arc::new(MemoryWallet::new("x", 0.0)))
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let reg = registry();
        assert_eq!(reg.lookup("ecc"), Some(CoinId::MESSAGING));
        assert_eq!(reg.lookup(" Btc "), reg.lookup("btc"));
        assert_eq!(reg.lookup("ltc"), None);
    }

    #[test]
    fn duplicates_are_ignored_and_symbols_lowercased() {
        let reg = registry();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.messaging().symbol, "ecc");
        let btc = reg.lookup("btc").unwrap();
        assert_eq!(reg.get(btc).name, "Bitcoin");
    }
}
