//! Reply text for every command outcome

use std::time::Duration;

use crate::db::tables::{KeyScore, Quote};
use crate::dice::RollOutcome;
use crate::error::ValidationError;

pub fn pong() -> String {
    "Pong!".to_string()
}

pub fn help(prefix: &str) -> String {
    format!(
        "**D0g Commands**\n\n\
        - `{p}ping` - Check the bot is alive\n\
        - `{p}uptime` - How long the bot has been running\n\
        - `{p}roll <dice>` - Roll dice, e.g. `{p}roll 3d6+2`\n\
        - `{p}+ @user for <reason>` - Give someone a point\n\
        - `{p}- @user for <reason>` - Take a point away\n\
        - `{p}score [@user]` - Show what someone has been rated for\n\
        - `{p}top` - Show everyone's total score\n\
        - `{p}quote [get|add|del|list] [@user] [text|id]` - Manage quotes",
        p = prefix
    )
}

/// Elapsed time as `3d4h5m6s`, leading zero units omitted
pub fn uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, mins, secs) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60, secs % 60);

    let mut out = String::from("Uptime: ");
    if days > 0 {
        out.push_str(&format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if days > 0 || hours > 0 || mins > 0 {
        out.push_str(&format!("{}m", mins));
    }
    out.push_str(&format!("{}s", secs));
    out
}

pub fn roll_result(user: &str, expr: &str, outcome: &RollOutcome) -> String {
    let rolls: Vec<String> = outcome.rolls.iter().map(|r| r.to_string()).collect();
    let rolls = if rolls.is_empty() { "none".to_string() } else { rolls.join(", ") };
    format!(
        ":game_die: **{}** rolled `{}` and got the following results: `{}`\n\nFinal result: **{}**",
        user, expr, rolls, outcome.total
    )
}

pub fn roll_gibberish(user: &str, input: &str) -> String {
    format!(
        ":poop: **{}** rolled `{}` but that is incomprehensible gibberish, so they critical fail at life",
        user, input
    )
}

pub fn score_logged(delta: i64) -> String {
    let symbol = if delta < 0 { ":-1:" } else { ":+1:" };
    format!(":trophy: score logged! {}", symbol)
}

pub fn self_rating() -> String {
    ":poop: You can't rate yourself, scumbag!".to_string()
}

pub fn score_failure() -> String {
    ":trophy: I couldn't log this score due to an error. :sob:".to_string()
}

pub fn quote_failure() -> String {
    ":poop: I couldn't perform the requested quote command".to_string()
}

pub fn generic_failure() -> String {
    ":poop: Something went wrong, try again later. :sob:".to_string()
}

pub fn unknown_user(who: &str) -> String {
    format!(":trophy: no idea who {} is", who)
}

/// User-facing text for a rejected command
pub fn validation(err: &ValidationError) -> String {
    match err {
        ValidationError::SelfRating => self_rating(),
        ValidationError::UnknownUser(who) => unknown_user(who),
        ValidationError::MissingMention
        | ValidationError::MissingFor
        | ValidationError::MissingReason => score_failure(),
        ValidationError::MissingQuote | ValidationError::InvalidQuoteId(_) => quote_failure(),
    }
}

pub fn score_list(name: &str, scores: &[KeyScore]) -> String {
    if scores.is_empty() {
        return format!(":trophy: {} has not been rated", name);
    }

    let total: i64 = scores.iter().map(|s| s.score).sum();
    let mut lines = vec![format!(
        ":trophy: {} has been rated {} for the following:\n",
        name, total
    )];
    lines.extend(
        scores
            .iter()
            .map(|s| format!("**{}** for `{}`", s.score, s.key)),
    );
    lines.join("\n")
}

/// `totals` pairs a display name with a total, already in leaderboard order
pub fn leaderboard(totals: &[(String, i64)]) -> String {
    if totals.is_empty() {
        return ":trophy: No-one has been rated".to_string();
    }

    let mut lines = vec![":trophy: Everyone has been rated for the following:".to_string()];
    lines.extend(
        totals
            .iter()
            .map(|(name, total)| format!("**{}** has a score of **{}**", name, total)),
    );
    lines.join("\n")
}

pub fn quote_said(name: &str, quote: &Quote) -> String {
    format!(":speech_balloon: {} said {:?}", name, quote.text)
}

pub fn no_quotes(name: &str) -> String {
    format!(":speech_balloon: {} has no quotes", name)
}

pub fn quote_list(name: &str, quotes: &[Quote]) -> String {
    if quotes.is_empty() {
        return no_quotes(name);
    }

    let mut out = format!(":speech_balloon: All quotes by {}\n", name);
    for quote in quotes {
        out.push_str(&format!("  {}: {:?}\n", quote.id, quote.text));
    }
    out
}

pub fn quote_added(name: &str, id: u64) -> String {
    format!(":speech_balloon: Saved quote {} for {}", id, name)
}

pub fn quote_deleted(name: &str, id: u64, removed: bool) -> String {
    if removed {
        format!(":speech_balloon: Deleted quote {} for {}", id, name)
    } else {
        format!(":speech_balloon: {} has no quote {}", name, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_format() {
        assert_eq!(uptime(Duration::from_secs(6)), "Uptime: 6s");
        assert_eq!(uptime(Duration::from_secs(306)), "Uptime: 5m6s");
        assert_eq!(uptime(Duration::from_secs(3_600)), "Uptime: 1h0m0s");
        assert_eq!(uptime(Duration::from_secs(3 * 86_400 + 4 * 3_600 + 5 * 60 + 6)), "Uptime: 3d4h5m6s");
    }

    #[test]
    fn test_score_list() {
        let scores = vec![
            KeyScore { key: "being helpful".into(), score: 3 },
            KeyScore { key: "puns".into(), score: -1 },
        ];
        let text = score_list("bob", &scores);
        assert!(text.starts_with(":trophy: bob has been rated 2 for the following:"));
        assert!(text.contains("**3** for `being helpful`"));
        assert!(text.contains("**-1** for `puns`"));

        assert_eq!(score_list("bob", &[]), ":trophy: bob has not been rated");
    }

    #[test]
    fn test_leaderboard() {
        let text = leaderboard(&[("B".into(), 9), ("A".into(), 5)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "**B** has a score of **9**");
        assert_eq!(lines[2], "**A** has a score of **5**");
        assert_eq!(leaderboard(&[]), ":trophy: No-one has been rated");
    }

    #[test]
    fn test_quote_list_escapes_text() {
        let quotes = vec![
            Quote { id: 1, text: "hello".into() },
            Quote { id: 3, text: "say \"hi\"".into() },
        ];
        let text = quote_list("amy", &quotes);
        assert!(text.contains("  1: \"hello\"\n"));
        assert!(text.contains("  3: \"say \\\"hi\\\"\"\n"));
        assert_eq!(quote_list("amy", &[]), no_quotes("amy"));
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(validation(&ValidationError::SelfRating), self_rating());
        assert_eq!(validation(&ValidationError::MissingFor), score_failure());
        assert_eq!(validation(&ValidationError::MissingQuote), quote_failure());
        assert_eq!(
            validation(&ValidationError::UnknownUser("bob".into())),
            ":trophy: no idea who bob is"
        );
    }
}
