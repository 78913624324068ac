//! Prefix command parsing and execution

pub mod format;
pub mod text;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::db::Store;
use crate::dice::DiceExpr;
use crate::error::{BotError, BotResult, ValidationError};
use text::{next_token, normalize_quote, normalize_reason, uid_from_mention};

/// A chat user as seen by the command layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
}

/// Transport-neutral view of an inbound message
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Isolation scope for all stored data (the guild)
    pub community_id: String,
    pub author: ChatUser,
    pub content: String,
    /// Users mentioned in the message, used for display names
    pub mentions: Vec<ChatUser>,
}

/// Resolves user ids that are not part of the message to display names
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn username(&self, user_id: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteAction {
    Get,
    List,
    Add(String),
    Del(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Help,
    Uptime,
    /// `roll <expr>`, raw expression text
    Roll(String),
    /// `+`/`-` with the mentioned user and normalized reason
    Adjust { delta: i64, target: String, reason: String },
    /// `score [mention]`, None means the author
    Score { subject: Option<String> },
    Top,
    Quote { subject: Option<String>, action: QuoteAction },
}

/// Parse a message body. `Ok(None)` means the message is not a command we
/// answer and should be ignored without a reply.
pub fn parse(content: &str, prefix: &str) -> Result<Option<Command>, ValidationError> {
    let Some(body) = content.strip_prefix(prefix) else {
        return Ok(None);
    };
    let Some((command, args)) = next_token(body) else {
        return Ok(None);
    };

    log::debug!("Commands: parsing {:?} with args {:?}", command, args);

    let command = match command.to_lowercase().as_str() {
        "ping" => Command::Ping,
        "help" => Command::Help,
        "uptime" => Command::Uptime,
        "roll" => Command::Roll(args.trim().to_string()),
        "+" => parse_adjust(1, args)?,
        "-" => parse_adjust(-1, args)?,
        "score" => parse_score(args)?,
        "top" => Command::Top,
        "quote" => match parse_quote(args)? {
            Some(cmd) => cmd,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// `<mention> for <reason>`
fn parse_adjust(delta: i64, args: &str) -> Result<Command, ValidationError> {
    let (mention, rest) = next_token(args).ok_or(ValidationError::MissingMention)?;
    let target = uid_from_mention(mention).ok_or(ValidationError::MissingMention)?;

    let reason = match next_token(rest) {
        Some(("for", reason)) => reason,
        _ => return Err(ValidationError::MissingFor),
    };

    let reason = normalize_reason(reason);
    if reason.is_empty() {
        return Err(ValidationError::MissingReason);
    }

    Ok(Command::Adjust {
        delta,
        target: target.to_string(),
        reason,
    })
}

fn parse_score(args: &str) -> Result<Command, ValidationError> {
    match next_token(args) {
        None => Ok(Command::Score { subject: None }),
        Some((token, _)) => match uid_from_mention(token) {
            Some(uid) => Ok(Command::Score {
                subject: Some(uid.to_string()),
            }),
            None => Err(ValidationError::UnknownUser(token.to_string())),
        },
    }
}

/// `[get|add|del|list] [mention] [args]` or a bare mention (implied get)
fn parse_quote(args: &str) -> Result<Option<Command>, ValidationError> {
    let Some((first, rest)) = next_token(args) else {
        return Ok(Some(Command::Quote {
            subject: None,
            action: QuoteAction::Get,
        }));
    };

    let verb = first.to_lowercase();
    if !matches!(verb.as_str(), "get" | "add" | "del" | "list") {
        return match uid_from_mention(first) {
            Some(uid) => Ok(Some(Command::Quote {
                subject: Some(uid.to_string()),
                action: QuoteAction::Get,
            })),
            None => {
                log::debug!("Commands: ignoring invalid quote command {:?}", first);
                Ok(None)
            }
        };
    }

    // An optional mention picks whose quotes are addressed
    let (subject, rest) = match next_token(rest) {
        Some((token, after)) => match uid_from_mention(token) {
            Some(uid) => (Some(uid.to_string()), after),
            None => (None, rest),
        },
        None => (None, rest),
    };
    let rest = rest.trim();

    let action = match verb.as_str() {
        "add" => {
            let text = normalize_quote(rest);
            if text.is_empty() {
                return Err(ValidationError::MissingQuote);
            }
            QuoteAction::Add(text)
        }
        "del" => {
            let id = next_token(rest).map(|(id, _)| id).unwrap_or_default();
            match id.parse::<u64>() {
                Ok(id) if id > 0 => QuoteAction::Del(id),
                _ => return Err(ValidationError::InvalidQuoteId(id.to_string())),
            }
        }
        "list" => QuoteAction::List,
        _ => QuoteAction::Get,
    };

    Ok(Some(Command::Quote { subject, action }))
}

/// Executes commands against the store. One instance is shared by every
/// message handler task.
pub struct Bot {
    store: Arc<Store>,
    prefix: String,
    started: Instant,
    rng: Mutex<StdRng>,
}

impl Bot {
    pub fn new(store: Arc<Store>, prefix: impl Into<String>) -> Self {
        Self::with_rng(store, prefix, StdRng::from_entropy())
    }

    /// Use a caller-provided random source for quotes and dice
    pub fn with_rng(store: Arc<Store>, prefix: impl Into<String>, rng: StdRng) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            started: Instant::now(),
            rng: Mutex::new(rng),
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Handle one message, returning the reply to send (if any)
    pub async fn handle(&self, msg: &IncomingMessage, users: &dyn UserDirectory) -> Option<String> {
        let command = match parse(&msg.content, &self.prefix) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                log_rejection(msg, &e);
                return Some(format::validation(&e));
            }
        };

        match self.execute(&command, msg, users).await {
            Ok(reply) => Some(reply),
            Err(BotError::Validation(e)) => {
                log_rejection(msg, &e);
                Some(format::validation(&e))
            }
            Err(e) => {
                if e.is_incident() {
                    log::error!(
                        "Commands: {:?} from {} in {} failed: {}",
                        command,
                        msg.author.id,
                        msg.community_id,
                        e
                    );
                } else {
                    log::info!("Commands: {:?} from {}: {}", command, msg.author.id, e);
                }
                Some(match command {
                    Command::Adjust { .. } => format::score_failure(),
                    Command::Quote { .. } => format::quote_failure(),
                    _ => format::generic_failure(),
                })
            }
        }
    }

    async fn execute(
        &self,
        command: &Command,
        msg: &IncomingMessage,
        users: &dyn UserDirectory,
    ) -> BotResult<String> {
        let community = msg.community_id.as_str();

        match command {
            Command::Ping => Ok(format::pong()),
            Command::Help => Ok(format::help(&self.prefix)),
            Command::Uptime => Ok(format::uptime(self.started.elapsed())),
            Command::Roll(input) => Ok(self.roll(&msg.author.name, input)),
            Command::Adjust { delta, target, reason } => {
                if *target == msg.author.id {
                    return Err(ValidationError::SelfRating.into());
                }
                self.store
                    .adjust_score(community, &msg.author.id, target, reason, *delta)?;
                Ok(format::score_logged(*delta))
            }
            Command::Score { subject } => {
                let subject = subject.as_deref().unwrap_or(&msg.author.id);
                let scores = self.store.list_reasons(community, subject)?;
                let name = display_name(msg, users, subject).await;
                Ok(format::score_list(&name, &scores))
            }
            Command::Top => {
                let totals = self.store.list_totals(community)?;
                let mut named = Vec::with_capacity(totals.len());
                for entry in totals {
                    let name = display_name(msg, users, &entry.key).await;
                    named.push((name, entry.score));
                }
                Ok(format::leaderboard(&named))
            }
            Command::Quote { subject, action } => {
                let owner = subject.as_deref().unwrap_or(&msg.author.id);
                let name = display_name(msg, users, owner).await;
                self.quote(community, owner, &name, action)
            }
        }
    }

    fn roll(&self, user: &str, input: &str) -> String {
        match DiceExpr::parse(input) {
            Ok(expr) => {
                let outcome = expr.roll(&mut *self.rng.lock());
                format::roll_result(user, &expr.to_string(), &outcome)
            }
            Err(e) => {
                log::info!("Commands: bad roll {:?} from {}: {}", input, user, e);
                format::roll_gibberish(user, input)
            }
        }
    }

    fn quote(&self, community: &str, owner: &str, name: &str, action: &QuoteAction) -> BotResult<String> {
        match action {
            QuoteAction::Get => {
                let picked = {
                    let mut rng = self.rng.lock();
                    self.store.random_quote(community, owner, &mut *rng)
                };
                match picked {
                    Ok(quote) => Ok(format::quote_said(name, &quote)),
                    Err(BotError::NotFound(_)) => Ok(format::no_quotes(name)),
                    Err(e) => Err(e),
                }
            }
            QuoteAction::List => {
                let quotes = self.store.list_quotes(community, owner)?;
                Ok(format::quote_list(name, &quotes))
            }
            QuoteAction::Add(text) => {
                let id = self.store.add_quote(community, owner, text)?;
                Ok(format::quote_added(name, id))
            }
            QuoteAction::Del(id) => {
                let removed = self.store.delete_quote(community, owner, *id)?;
                Ok(format::quote_deleted(name, *id, removed))
            }
        }
    }
}

fn log_rejection(msg: &IncomingMessage, err: &ValidationError) {
    match err {
        ValidationError::SelfRating => {
            log::debug!("Commands: {} tried to rate themselves", msg.author.id)
        }
        _ => log::warn!(
            "Commands: rejected {:?} from {}: {}",
            msg.content,
            msg.author.id,
            err
        ),
    }
}

/// Author, then message mentions, then the directory; the raw id as a last resort
async fn display_name(msg: &IncomingMessage, users: &dyn UserDirectory, user_id: &str) -> String {
    if msg.author.id == user_id {
        return msg.author.name.clone();
    }
    if let Some(user) = msg.mentions.iter().find(|u| u.id == user_id) {
        return user.name.clone();
    }
    users
        .username(user_id)
        .await
        .unwrap_or_else(|| user_id.to_string())
}
