//! Token ledger collaborator.
//!
//! Owns token id allocation and ownership bookkeeping. The workflow calls
//! [`TokenLedger::mint_to`] exactly once per successful fulfillment.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{MintError, MintResult};
use crate::state::{Category, MintedToken, Requester, TokenId};

pub trait TokenLedger: Send + Sync {
    /// Mint a new token tagged with `category` to `owner`.
    fn mint_to(&self, owner: &Requester, category: Category) -> MintResult<TokenId>;

    /// Number of tokens minted so far; also the next token id.
    fn token_counter(&self) -> u64;
}

/// In-memory ERC-721 style collection with one metadata URI per category.
pub struct InMemoryLedger {
    name: String,
    symbol: String,
    category_uris: Vec<String>,
    tokens: Mutex<Vec<MintedToken>>,
}

impl InMemoryLedger {
    /// Empty collection; `category_uris[i]` is the metadata URI of category `i`.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, category_uris: Vec<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            category_uris,
            tokens: Mutex::new(Vec::new()),
        }
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Metadata URIs indexed by category.
    pub fn category_uris(&self) -> &[String] {
        &self.category_uris
    }

    /// Metadata URI of `category`, if the collection has one.
    pub fn category_uri(&self, category: Category) -> Option<&str> {
        self.category_uris
            .get(category.0 as usize)
            .map(String::as_str)
    }

    /// Look up a minted token.
    pub fn token(&self, token_id: TokenId) -> MintResult<MintedToken> {
        let tokens = self.lock();
        usize::try_from(token_id.0)
            .ok()
            .and_then(|index| tokens.get(index))
            .cloned()
            .ok_or(MintError::UnknownToken(token_id))
    }

    /// Current owner of a minted token.
    pub fn owner_of(&self, token_id: TokenId) -> MintResult<Requester> {
        self.token(token_id).map(|t| t.owner)
    }

    /// Metadata URI of the token's category.
    pub fn token_uri(&self, token_id: TokenId) -> MintResult<String> {
        let token = self.token(token_id)?;
        self.category_uri(token.category)
            .map(str::to_owned)
            .ok_or(MintError::MissingTokenUri(token.category))
    }

    /// Number of tokens owned by `owner`.
    pub fn balance_of(&self, owner: &Requester) -> usize {
        self.lock().iter().filter(|t| &t.owner == owner).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MintedToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenLedger for InMemoryLedger {
    fn mint_to(&self, owner: &Requester, category: Category) -> MintResult<TokenId> {
        if self.category_uri(category).is_none() {
            return Err(MintError::MissingTokenUri(category));
        }

        let mut tokens = self.lock();
        let token_id = TokenId(tokens.len() as u64);
        tokens.push(MintedToken {
            token_id,
            category,
            owner: owner.clone(),
        });
        Ok(token_id)
    }

    fn token_counter(&self) -> u64 {
        self.lock().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(
            "Random IPFS NFT",
            "RIN",
            vec![
                "ipfs://pug".into(),
                "ipfs://shiba-inu".into(),
                "ipfs://st-bernard".into(),
            ],
        )
    }

    #[test]
    fn starts_empty() {
        let ledger = ledger();
        assert_eq!(ledger.token_counter(), 0);
        assert_eq!(ledger.name(), "Random IPFS NFT");
        assert_eq!(ledger.symbol(), "RIN");
    }

    #[test]
    fn mints_sequential_ids() {
        let ledger = ledger();
        let alice = Requester::new("alice");
        assert_eq!(ledger.mint_to(&alice, Category(0)).unwrap(), TokenId(0));
        assert_eq!(ledger.mint_to(&alice, Category(2)).unwrap(), TokenId(1));
        assert_eq!(ledger.token_counter(), 2);
        assert_eq!(ledger.balance_of(&alice), 2);
        assert_eq!(ledger.owner_of(TokenId(1)).unwrap(), alice);
    }

    #[test]
    fn token_uri_follows_category() {
        let ledger = ledger();
        let id = ledger.mint_to(&Requester::new("bob"), Category(1)).unwrap();
        let uri = ledger.token_uri(id).unwrap();
        assert!(uri.starts_with("ipfs://"));
        assert_eq!(Some(uri.as_str()), ledger.category_uri(Category(1)));
    }

    #[test]
    fn rejects_category_without_uri() {
        let ledger = ledger();
        assert_eq!(
            ledger.mint_to(&Requester::new("bob"), Category(3)),
            Err(MintError::MissingTokenUri(Category(3)))
        );
        assert_eq!(ledger.token_counter(), 0);
    }

    #[test]
    fn unknown_token_lookup_fails() {
        let ledger = ledger();
        assert_eq!(ledger.token(TokenId(0)), Err(MintError::UnknownToken(TokenId(0))));
        assert!(ledger.token_uri(TokenId(9)).is_err());
    }
}
