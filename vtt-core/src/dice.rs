//! Dice literals (`2d6+3`, `4d6kh3`, `d20-1`) and the rolls behind them.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Most dice a single expression may roll.
pub const MAX_DICE: u32 = 10_000;
/// Largest die.
pub const MAX_SIDES: u32 = 1_000_000;

lazy_static! {
    static ref TERM: Regex = Regex::new(r"^(\d*)d(\d+)(?:k([hl])(\d+))?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("'{0}' is not dice notation")]
    Malformed(String),
    #[error("A die needs at least one side")]
    NoSides,
    #[error("'{0}' rolls no dice")]
    Empty(String),
    #[error("Cannot keep {keep} of {count} dice")]
    KeepTooMany { keep: u32, count: u32 },
    #[error("Cannot roll {count} dice, the limit is {}", MAX_DICE)]
    TooManyDice { count: u64 },
    #[error("A die cannot have {sides} sides, the limit is {}", MAX_SIDES)]
    TooManySides { sides: u32 },
    #[error("Dice total is out of range")]
    Overflow,
}

/// Which rolls of a pool count towards the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    All,
    Highest(u32),
    Lowest(u32),
}

/// `count` dice of `sides` sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DicePool {
    pub count: u32,
    pub sides: u32,
    pub keep: Keep,
}

impl DicePool {
    pub fn new(count: u32, sides: u32) -> Result<Self, DiceError> {
        if sides == 0 {
            return Err(DiceError::NoSides);
        }
        if sides > MAX_SIDES {
            return Err(DiceError::TooManySides { sides });
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice { count: u64::from(count) });
        }
        Ok(Self { count, sides, keep: Keep::All })
    }

    fn keeping(mut self, keep: Keep) -> Result<Self, DiceError> {
        if let Keep::Highest(n) | Keep::Lowest(n) = keep {
            if n > self.count {
                return Err(DiceError::KeepTooMany { keep: n, count: self.count });
            }
        }
        self.keep = keep;
        Ok(self)
    }

    fn roll<R: Rng>(&self, rng: &mut R) -> PoolRoll {
        let rolls: Vec<u32> = (0..self.count).map(|_| rng.gen_range(1..=self.sides)).collect();
        let mut ranked = rolls.clone();
        let kept = match self.keep {
            Keep::All => self.count,
            Keep::Highest(n) => {
                ranked.sort_unstable_by(|a, b| b.cmp(a));
                n
            }
            Keep::Lowest(n) => {
                ranked.sort_unstable();
                n
            }
        };
        let sum = ranked.iter().take(kept as usize).map(|r| i64::from(*r)).sum();
        PoolRoll { rolls, sum }
    }
}

impl fmt::Display for DicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.keep {
            Keep::All => Ok(()),
            Keep::Highest(n) => write!(f, "kh{n}"),
            Keep::Lowest(n) => write!(f, "kl{n}"),
        }
    }
}

/// A sum of dice pools plus a flat modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpression {
    pub pools: Vec<DicePool>,
    pub modifier: i64,
}

impl DiceExpression {
    /// Parses `NdS` terms and integer modifiers joined by `+` or `-`.
    /// Subtracting a pool is not supported.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let compact: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let malformed = || DiceError::Malformed(notation.trim().to_string());
        if !compact.is_ascii() {
            return Err(malformed());
        }

        let mut expression = DiceExpression { pools: Vec::new(), modifier: 0 };
        let mut rest = compact.as_str();
        while !rest.is_empty() {
            let end = rest[1..].find(['+', '-']).map_or(rest.len(), |i| i + 1);
            let (signed, tail) = rest.split_at(end);
            let negative = signed.starts_with('-');
            let term = signed.strip_prefix(['+', '-']).unwrap_or(signed);
            if term.is_empty() {
                return Err(malformed());
            }

            if let Ok(n) = term.parse::<i64>() {
                let n = if negative { -n } else { n };
                expression.modifier = expression.modifier.checked_add(n).ok_or(DiceError::Overflow)?;
            } else {
                let captures = TERM.captures(term).ok_or_else(malformed)?;
                if negative {
                    return Err(malformed());
                }
                let count = match &captures[1] {
                    "" => 1,
                    digits => digits.parse().map_err(|_| malformed())?,
                };
                let sides = captures[2].parse().map_err(|_| malformed())?;
                let keep = match (captures.get(3).map(|m| m.as_str()), captures.get(4)) {
                    (Some("h"), Some(n)) => Keep::Highest(n.as_str().parse().map_err(|_| malformed())?),
                    (Some(_), Some(n)) => Keep::Lowest(n.as_str().parse().map_err(|_| malformed())?),
                    _ => Keep::All,
                };
                expression.pools.push(DicePool::new(count, sides)?.keeping(keep)?);
            }

            rest = tail;
        }

        if expression.pools.is_empty() {
            return Err(DiceError::Empty(notation.trim().to_string()));
        }
        let count: u64 = expression.pools.iter().map(|p| u64::from(p.count)).sum();
        if count > u64::from(MAX_DICE) {
            return Err(DiceError::TooManyDice { count });
        }
        Ok(expression)
    }

    /// A plain `count`d`sides` expression.
    pub fn simple(count: u32, sides: u32) -> Result<Self, DiceError> {
        Ok(DiceExpression { pools: vec![DicePool::new(count, sides)?], modifier: 0 })
    }

    pub fn roll(&self) -> Result<Roll, DiceError> {
        self.roll_with(&mut rand::thread_rng())
    }

    pub fn roll_with<R: Rng>(&self, rng: &mut R) -> Result<Roll, DiceError> {
        let pools: Vec<PoolRoll> = self.pools.iter().map(|pool| pool.roll(rng)).collect();
        let total = pools
            .iter()
            .try_fold(self.modifier, |total, pool| total.checked_add(pool.sum))
            .ok_or(DiceError::Overflow)?;
        Ok(Roll { pools, total })
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pools: Vec<String> = self.pools.iter().map(ToString::to_string).collect();
        write!(f, "{}", pools.join("+"))?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRoll {
    pub rolls: Vec<u32>,
    pub sum: i64,
}

/// Every die rolled and the resulting total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roll {
    pub pools: Vec<PoolRoll>,
    pub total: i64,
}

impl fmt::Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pool in &self.pools {
            write!(f, "{:?} ", pool.rolls)?;
        }
        write!(f, "= {}", self.total)
    }
}
