//! Flat key namespace for per-community buckets.
//!
//! Buckets are named `community:{id}:{domain}[:{subject}]`. Id components are
//! escaped so that an id containing `:` can never alias another bucket.

use crate::error::{BotError, BotResult};

/// Logical data domain inside a community
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Scores,
    ScoresTotals,
    Quotes,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scores => "scores",
            Domain::ScoresTotals => "scorestotals",
            Domain::Quotes => "quotes",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

/// Build a bucket name. `subject` is omitted for community-wide domains.
pub fn bucket(community: &str, domain: Domain, subject: Option<&str>) -> Vec<u8> {
    let mut name = format!("community:{}:{}", escape(community), domain);
    if let Some(subject) = subject {
        name.push(':');
        name.push_str(&escape(subject));
    }
    name.into_bytes()
}

/// `community:{id}:scores:{user}` - reason -> score
pub fn scores_bucket(community: &str, user: &str) -> Vec<u8> {
    bucket(community, Domain::Scores, Some(user))
}

/// `community:{id}:scorestotals` - user -> total
pub fn totals_bucket(community: &str) -> Vec<u8> {
    bucket(community, Domain::ScoresTotals, None)
}

/// `community:{id}:quotes:{user}` - sequence -> quote
pub fn quotes_bucket(community: &str, user: &str) -> Vec<u8> {
    bucket(community, Domain::Quotes, Some(user))
}

/// 8-byte big-endian key, so byte order equals numeric order
pub fn sequence_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

pub fn decode_sequence_key(key: &[u8]) -> BotResult<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| {
        BotError::storage(format!(
            "sequence key must be 8 bytes, got {}",
            key.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_layout() {
        assert_eq!(scores_bucket("g1", "42"), b"community:g1:scores:42".to_vec());
        assert_eq!(totals_bucket("g1"), b"community:g1:scorestotals".to_vec());
        assert_eq!(quotes_bucket("g1", "42"), b"community:g1:quotes:42".to_vec());
    }

    #[test]
    fn test_separator_in_ids_does_not_collide() {
        // Unescaped these would both read "community:a:b:scores:c"
        let a = bucket("a:b", Domain::Scores, Some("c"));
        let b = bucket("a", Domain::Scores, Some("b:scores:c"));
        assert_ne!(a, b);

        assert_ne!(bucket("a%3Ab", Domain::Quotes, Some("x")), bucket("a:b", Domain::Quotes, Some("x")));
    }

    #[test]
    fn test_sequence_keys_sort_numerically() {
        let mut keys: Vec<Vec<u8>> = [300u64, 2, 1, 256, 10].iter().map(|&i| sequence_key(i)).collect();
        keys.sort();
        let decoded: Vec<u64> = keys.iter().map(|k| decode_sequence_key(k).unwrap()).collect();
        assert_eq!(decoded, vec![1, 2, 10, 256, 300]);
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert!(matches!(decode_sequence_key(b"12"), Err(BotError::Storage(_))));
        assert_eq!(decode_sequence_key(&sequence_key(7)).unwrap(), 7);
    }
}
