//! Quote archive, one bucket per (community, owner) keyed by sequence id

use rand::Rng;

use super::super::keys;
use super::super::Store;
use crate::commands::text::normalize_quote;
use crate::error::{BotError, BotResult, ValidationError};

/// A stored quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub id: u64,
    pub text: String,
}

impl Store {
    /// Store `text` under the owner's next sequence id and return that id.
    /// The text is normalized first, so over-long quotes are cut.
    pub fn add_quote(&self, community: &str, owner: &str, text: &str) -> BotResult<u64> {
        let text = normalize_quote(text);
        if text.is_empty() {
            return Err(ValidationError::MissingQuote.into());
        }

        let bucket = keys::quotes_bucket(community, owner);
        let id = self.update(|tx| {
            let id = tx.next_sequence(&bucket)?;
            tx.put(&bucket, &keys::sequence_key(id), text.as_bytes())?;
            Ok(id)
        })?;

        log::info!("Store: added quote {} for {}/{}", id, community, owner);
        Ok(id)
    }

    /// Remove a quote. Returns false when no quote had that id.
    pub fn delete_quote(&self, community: &str, owner: &str, id: u64) -> BotResult<bool> {
        let bucket = keys::quotes_bucket(community, owner);
        let removed = self.update(|tx| tx.delete(&bucket, &keys::sequence_key(id)))?;
        log::info!(
            "Store: delete quote {} for {}/{} (removed={})",
            id,
            community,
            owner,
            removed
        );
        Ok(removed)
    }

    /// All of the owner's quotes in ascending id order
    pub fn list_quotes(&self, community: &str, owner: &str) -> BotResult<Vec<Quote>> {
        let bucket = keys::quotes_bucket(community, owner);
        let pairs = self.view(|tx| tx.scan(&bucket))?;

        pairs
            .into_iter()
            .map(|(k, v)| {
                Ok(Quote {
                    id: keys::decode_sequence_key(&k)?,
                    text: String::from_utf8_lossy(&v).into_owned(),
                })
            })
            .collect()
    }

    /// One of the owner's quotes, chosen uniformly with `rng`
    pub fn random_quote<R: Rng + ?Sized>(
        &self,
        community: &str,
        owner: &str,
        rng: &mut R,
    ) -> BotResult<Quote> {
        let mut quotes = self.list_quotes(community, owner)?;
        if quotes.is_empty() {
            return Err(BotError::NotFound(format!("quotes for {}", owner)));
        }
        let index = rng.gen_range(0..quotes.len());
        Ok(quotes.swap_remove(index))
    }
}
