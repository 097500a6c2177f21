use serde::{Deserialize, Serialize};

use crate::symbols::Symbol;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Win,
    Pair,
    Lose,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Classification::Win => "win",
            Classification::Pair => "pair",
            Classification::Lose => "lose",
        })
    }
}

impl std::str::FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Classification::Win),
            "pair" => Ok(Classification::Pair),
            "lose" => Ok(Classification::Lose),
            other => Err(format!("unknown classification: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub classification: Classification,
    pub payout: u64,
    pub message: String,
}

impl Outcome {
    pub fn pays(&self) -> bool {
        self.payout > 0
    }
}

/// Pair payout: floor(wager * 1.5).
pub fn pair_payout(wager: u64) -> u64 {
    wager.saturating_mul(3) / 2
}

/// Score three settled reels. Three of a kind pays the symbol's multiplier,
/// any two matching names pay one and a half times the wager.
pub fn evaluate(a: &Symbol, b: &Symbol, c: &Symbol, wager: u64) -> Outcome {
    if a.name == b.name && b.name == c.name {
        let payout = wager.saturating_mul(a.multiplier);
        return Outcome {
            classification: Classification::Win,
            payout,
            message: format!("Jackpot! Three {}s! You won ${}!", a.name, payout),
        };
    }

    if a.name == b.name || b.name == c.name || a.name == c.name {
        let payout = pair_payout(wager);
        return Outcome {
            classification: Classification::Pair,
            payout,
            message: format!("Pair! You won ${}!", payout),
        };
    }

    Outcome {
        classification: Classification::Lose,
        payout: 0,
        message: "No match. Try again!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Catalog;

    fn sym(name: &str) -> Symbol {
        Catalog::classic().by_name(name).cloned().unwrap()
    }

    #[test]
    fn three_of_a_kind_uses_multiplier() {
        for s in Catalog::classic().symbols() {
            let out = evaluate(s, s, s, 7);
            assert_eq!(out.classification, Classification::Win);
            assert_eq!(out.payout, 7 * s.multiplier);
        }
        let out = evaluate(&sym("Cherry"), &sym("Cherry"), &sym("Cherry"), 100);
        assert_eq!(out.payout, 1000);
        assert_eq!(out.message, "Jackpot! Three Cherrys! You won $1000!");
    }

    #[test]
    fn any_matching_pair_pays_one_and_a_half() {
        let (x, y) = (sym("Cherry"), sym("Lemon"));
        for (a, b, c) in [(&x, &x, &y), (&y, &x, &x), (&x, &y, &x)] {
            let out = evaluate(a, b, c, 100);
            assert_eq!(out.classification, Classification::Pair);
            assert_eq!(out.payout, 150);
        }
        assert_eq!(evaluate(&x, &y, &x, 7).payout, 10);
        assert_eq!(evaluate(&x, &y, &x, 1).payout, 1);
    }

    #[test]
    fn all_distinct_loses() {
        let out = evaluate(&sym("Cherry"), &sym("Lemon"), &sym("Star"), 100);
        assert_eq!(out.classification, Classification::Lose);
        assert_eq!(out.payout, 0);
        assert!(!out.pays());
    }

    #[test]
    fn huge_wager_saturates() {
        let seven = sym("Seven");
        assert_eq!(evaluate(&seven, &seven, &seven, u64::MAX).payout, u64::MAX);
    }
}
