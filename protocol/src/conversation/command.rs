//! Parsing of user input lines.
//!
//! Anything that does not start with `/` is chat text. Coin arguments are
//! kept as typed; the session resolves them against its registry.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown command syntax - try /help for a list of commands")]
pub struct SyntaxError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain chat text.
    Chat(String),
    Help,
    Version,
    Blocks(Option<String>),
    Peers(Option<String>),
    Tag,
    Balance(Option<String>),
    Address(Option<String>),
    Send {
        amount: String,
        coin: Option<String>,
    },
    Txid,
    List(Option<String>),
    Swap {
        amount_give: String,
        coin_give: String,
        amount_take: String,
        coin_take: String,
    },
    Execute,
    Replace(String),
    Delete,
    Exit,
}

/// `/help` output, one line per command.
pub const HELP: &[(&str, &str)] = &[
    ("/help", "display help - commands"),
    ("/exit", "exit - also /quit"),
    ("/version", "display version info"),
    ("/blocks  <coin>", "display block count"),
    ("/peers   <coin>", "display peer count"),
    ("/tag", "display routing tag"),
    ("/balance <coin>", "display wallet balance"),
    ("/address <coin>", "generate a new address"),
    ("/send x  <coin>", "send x to other party"),
    ("/txid", "display txid of last transaction"),
    ("/list    <coin>", "list all transactions this session"),
    ("         <coin>", "optional coin symbol - defaults to the messaging coin"),
    ("/swap x <coin-1> for y <coin-2>", "proposes a swap"),
    ("/execute", "executes the proposed swap"),
    ("/replace text", "replace previous message"),
    ("/delete", "erase previous message"),
];

impl FromStr for Command {
    type Err = SyntaxError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Chat(line.to_string()));
        };
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        let words: Vec<&str> = args.split_whitespace().collect();

        let coin = || -> Result<Option<String>, SyntaxError> {
            match words.as_slice() {
                [] => Ok(None),
                [sym] => Ok(Some(sym.to_string())),
                _ => Err(SyntaxError),
            }
        };
        let bare = |cmd: Command| if words.is_empty() { Ok(cmd) } else { Err(SyntaxError) };

        match name {
            "help" => bare(Command::Help),
            "version" => bare(Command::Version),
            "tag" => bare(Command::Tag),
            "txid" => bare(Command::Txid),
            "execute" => bare(Command::Execute),
            "delete" => bare(Command::Delete),
            "exit" | "quit" => bare(Command::Exit),
            "blocks" => coin().map(Command::Blocks),
            "peers" => coin().map(Command::Peers),
            "balance" => coin().map(Command::Balance),
            "address" => coin().map(Command::Address),
            "list" => coin().map(Command::List),
            "send" => match words.as_slice() {
                [amount] => Ok(Command::Send {
                    amount: amount.to_string(),
                    coin: None,
                }),
                [amount, sym] => Ok(Command::Send {
                    amount: amount.to_string(),
                    coin: Some(sym.to_string()),
                }),
                _ => Err(SyntaxError),
            },
            "swap" => match words.as_slice() {
                [x, a, "for", y, b] => Ok(Command::Swap {
                    amount_give: x.to_string(),
                    coin_give: a.to_string(),
                    amount_take: y.to_string(),
                    coin_take: b.to_string(),
                }),
                _ => Err(SyntaxError),
            },
            "replace" if !args.is_empty() => Ok(Command::Replace(args.to_string())),
            _ => Err(SyntaxError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, SyntaxError> {
        s.parse()
    }

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(parse("hello /there"), Ok(Command::Chat("hello /there".into())));
        assert_eq!(parse(""), Ok(Command::Chat(String::new())));
    }

    #[test]
    fn optional_coin_argument() {
        assert_eq!(parse("/balance"), Ok(Command::Balance(None)));
        assert_eq!(parse("/balance BTC"), Ok(Command::Balance(Some("BTC".into()))));
        assert_eq!(parse("/blocks btc extra"), Err(SyntaxError));
    }

    #[test]
    fn send_and_swap_shapes() {
        assert_eq!(
            parse("/send 1.5"),
            Ok(Command::Send {
                amount: "1.5".into(),
                coin: None
            })
        );
        assert_eq!(
            parse("/swap 1 ecc for 0.5 btc"),
            Ok(Command::Swap {
                amount_give: "1".into(),
                coin_give: "ecc".into(),
                amount_take: "0.5".into(),
                coin_take: "btc".into(),
            })
        );
        assert_eq!(parse("/swap 1 ecc to 0.5 btc"), Err(SyntaxError));
        assert_eq!(parse("/send"), Err(SyntaxError));
    }

    #[test]
    fn replace_keeps_inner_spacing() {
        assert_eq!(
            parse("/replace  fixed  typo "),
            Ok(Command::Replace("fixed  typo".into()))
        );
        assert_eq!(parse("/replace"), Err(SyntaxError));
    }

    #[test]
    fn unknown_and_quit() {
        assert_eq!(parse("/quit"), Ok(Command::Exit));
        assert_eq!(parse("/exit"), Ok(Command::Exit));
        let err = parse("/frobnicate").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown command syntax - try /help for a list of commands"
        );
    }
}
