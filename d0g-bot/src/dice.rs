//! Dice expressions such as `d20`, `3d6+2` or `2d10 - 1d4`

use std::fmt;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;

static EXPR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d*d\d+|\d+)([+-](\d*d\d+|\d+))*$").unwrap());
static TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+-]?)(?:(\d*)d(\d+)|(\d+))").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Dice { count: u32, sides: u32 },
    Constant(i64),
}

/// A parsed expression: signed terms summed left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpr {
    terms: Vec<(i64, Term)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    /// Face shown by each individual die, in expression order
    pub rolls: Vec<u32>,
    pub total: i64,
}

impl DiceExpr {
    pub fn parse(input: &str) -> Result<Self, String> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        if compact.is_empty() {
            return Err("empty dice expression".to_string());
        }
        if !EXPR_RE.is_match(&compact) {
            return Err(format!("unrecognised dice expression: {}", input));
        }

        let mut terms = Vec::new();
        for caps in TERM_RE.captures_iter(&compact) {
            let sign = if caps.get(1).map(|m| m.as_str()) == Some("-") { -1 } else { 1 };

            let term = if let Some(sides) = caps.get(3) {
                let count = match caps.get(2).map(|m| m.as_str()) {
                    Some("") | None => 1,
                    Some(n) => n.parse::<u32>().map_err(|e| format!("bad dice count: {}", e))?,
                };
                let sides = sides
                    .as_str()
                    .parse::<u32>()
                    .map_err(|e| format!("bad die size: {}", e))?;
                if count == 0 || count > MAX_DICE {
                    return Err(format!("dice count must be between 1 and {}", MAX_DICE));
                }
                if sides == 0 || sides > MAX_SIDES {
                    return Err(format!("die size must be between 1 and {}", MAX_SIDES));
                }
                Term::Dice { count, sides }
            } else {
                let value = caps
                    .get(4)
                    .map(|m| m.as_str())
                    .unwrap_or_default()
                    .parse::<i64>()
                    .map_err(|e| format!("bad constant: {}", e))?;
                Term::Constant(value)
            };
            terms.push((sign, term));
        }

        Ok(Self { terms })
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> RollOutcome {
        let mut rolls = Vec::new();
        let mut total = 0i64;

        for (sign, term) in &self.terms {
            match *term {
                Term::Dice { count, sides } => {
                    for _ in 0..count {
                        let face = rng.gen_range(1..=sides);
                        rolls.push(face);
                        total += sign * face as i64;
                    }
                }
                Term::Constant(value) => total += sign * value,
            }
        }

        RollOutcome { rolls, total }
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sign, term)) in self.terms.iter().enumerate() {
            if *sign < 0 {
                write!(f, "-")?;
            } else if i > 0 {
                write!(f, "+")?;
            }
            match term {
                Term::Dice { count, sides } => write!(f, "{}d{}", count, sides)?,
                Term::Constant(value) => write!(f, "{}", value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_parse_and_canonical_form() {
        assert_eq!(DiceExpr::parse("d20").unwrap().to_string(), "1d20");
        assert_eq!(DiceExpr::parse("3D6 + 2").unwrap().to_string(), "3d6+2");
        assert_eq!(DiceExpr::parse("2d10-1d4").unwrap().to_string(), "2d10-1d4");
        assert_eq!(DiceExpr::parse("+4").unwrap().to_string(), "4");
    }

    #[test]
    fn test_parse_rejects_gibberish() {
        assert!(DiceExpr::parse("").is_err());
        assert!(DiceExpr::parse("banana").is_err());
        assert!(DiceExpr::parse("3d").is_err());
        assert!(DiceExpr::parse("2d6++1").is_err());
        assert!(DiceExpr::parse("0d6").is_err());
        assert!(DiceExpr::parse("1d0").is_err());
        assert!(DiceExpr::parse("101d6").is_err());
    }

    #[test]
    fn test_roll_bounds() {
        let expr = DiceExpr::parse("4d6+3").unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let outcome = expr.roll(&mut rng);
            assert_eq!(outcome.rolls.len(), 4);
            assert!(outcome.rolls.iter().all(|&r| (1..=6).contains(&r)));
            let sum: i64 = outcome.rolls.iter().map(|&r| r as i64).sum();
            assert_eq!(outcome.total, sum + 3);
        }
    }

    #[test]
    fn test_negative_terms_subtract() {
        let expr = DiceExpr::parse("1d1-1d1-5").unwrap();
        let outcome = expr.roll(&mut StdRng::seed_from_u64(0));
        assert_eq!(outcome.rolls, vec![1, 1]);
        assert_eq!(outcome.total, -5);
    }
}
