// src/version.rs

//! Total-order comparison of package version strings
//!
//! Versions are split into runs of digits and runs of letters; separator
//! characters only delimit runs and never compare. Digit runs compare as
//! unbounded integers. Letter runs that spell a known release marker
//! carry a weight relative to the unmarked "final" release: alpha, beta,
//! pre and rc sort before it, patch-style markers after it. A version
//! that runs out of segments sorts below any version that still has one,
//! except against pre-release markers.
//!
//! The comparator is a strict total order with reflexive equality, so it
//! is usable directly as a stable sort key.

use std::cmp::Ordering;

/// Compare two version strings
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = Tokenizer::new(a);
    let mut right = Tokenizer::new(b);

    loop {
        let lt = left.next_token();
        let rt = right.next_token();

        if lt == Token::End && rt == Token::End {
            return Ordering::Equal;
        }

        let ord = compare_tokens(&lt, &rt);
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// True when `candidate` is strictly newer than `reference`
pub fn is_newer(candidate: &str, reference: &str) -> bool {
    compare(candidate, reference) == Ordering::Greater
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Word(&'a str),
    End,
}

/// Broad ordering class of a token. Classes compare before anything else:
/// pre-release markers < end-of-version < plain words < numbers < post markers.
fn token_class(token: &Token) -> i8 {
    match token {
        Token::End => 0,
        Token::Word(w) => match marker_rank(w) {
            Some(rank) if rank < 0 => -1,
            Some(_) => 3,
            None => 1,
        },
        Token::Number(_) => 2,
    }
}

/// Relative weight of a known release marker. Negative ranks sort before
/// the final release, positive ones after it.
fn marker_rank(word: &str) -> Option<i32> {
    match word.to_ascii_lowercase().as_str() {
        "dev" | "snapshot" => Some(-5),
        "alpha" => Some(-4),
        "beta" => Some(-3),
        "pre" | "prerelease" => Some(-2),
        "rc" | "cr" => Some(-1),
        "pl" => Some(1),
        "patch" => Some(2),
        "post" | "errata" => Some(3),
        _ => None,
    }
}

fn compare_tokens(a: &Token, b: &Token) -> Ordering {
    let class_ord = token_class(a).cmp(&token_class(b));
    if class_ord != Ordering::Equal {
        return class_ord;
    }

    match (a, b) {
        (Token::Number(x), Token::Number(y)) => compare_numbers(x, y),
        (Token::Word(x), Token::Word(y)) => match (marker_rank(x), marker_rank(y)) {
            (Some(rx), Some(ry)) => rx.cmp(&ry),
            _ => x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()),
        },
        _ => Ordering::Equal,
    }
}

/// Arbitrary-precision numeric comparison over digit runs
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn next_token(&mut self) -> Token<'a> {
        // Skip separators: anything that is neither digit nor letter
        let start = self
            .rest
            .find(|c: char| c.is_ascii_alphanumeric())
            .unwrap_or(self.rest.len());
        self.rest = &self.rest[start..];

        let mut chars = self.rest.char_indices();
        let Some((_, first)) = chars.next() else {
            return Token::End;
        };

        let is_digit_run = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| {
                if is_digit_run {
                    !c.is_ascii_digit()
                } else {
                    !c.is_ascii_alphabetic()
                }
            })
            .unwrap_or(self.rest.len());

        let (run, rest) = self.rest.split_at(end);
        self.rest = rest;

        if is_digit_run {
            Token::Number(run)
        } else {
            Token::Word(run)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_order(older: &str, newer: &str) {
        assert_eq!(
            compare(older, newer),
            Ordering::Less,
            "{} should sort before {}",
            older,
            newer
        );
        assert_eq!(
            compare(newer, older),
            Ordering::Greater,
            "{} should sort after {}",
            newer,
            older
        );
    }

    #[test]
    fn test_reflexive_equality() {
        for v in ["1.0.0", "1.0.1", "2.0.0~rc1", "2.0.0", "0", "abc", ""] {
            assert_eq!(compare(v, v), Ordering::Equal);
        }
    }

    #[test]
    fn test_required_ordering() {
        let ascending = ["1.0.0", "1.0.1", "2.0.0~rc1", "2.0.0"];
        for pair in ascending.windows(2) {
            assert_order(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_numeric_segments() {
        assert_order("1.9", "1.10");
        assert_order("1.2", "1.2.1");
        assert_order("9", "10");
        assert_eq!(compare("1.07", "1.7"), Ordering::Equal);
        // Beyond u64 range
        assert_order("18446744073709551616", "18446744073709551617");
    }

    #[test]
    fn test_prerelease_markers() {
        assert_order("2.0alpha", "2.0beta");
        assert_order("2.0beta", "2.0pre");
        assert_order("2.0pre", "2.0rc1");
        assert_order("2.0rc1", "2.0");
        assert_order("2.0-rc2", "2.0");
        assert_order("2.0rc1", "2.0rc2");
    }

    #[test]
    fn test_post_markers() {
        assert_order("1.0", "1.0p1");
        assert_order("1.0", "1.0patch1");
        assert_order("1.0pl1", "1.0patch1");
    }

    #[test]
    fn test_plain_letter_suffix() {
        // OpenSSL-style patch letters come after the plain release
        assert_order("1.0.2", "1.0.2a");
        assert_order("1.0.2a", "1.0.2b");
    }

    #[test]
    fn test_absent_segment_is_less() {
        assert_order("1.0", "1.0.0");
        assert_order("", "0");
    }

    #[test]
    fn test_separators_are_transparent() {
        assert_eq!(compare("1.0.0", "1-0-0"), Ordering::Equal);
        assert_eq!(compare("2.0.0~rc1", "2.0.0rc1"), Ordering::Equal);
    }

    #[test]
    fn test_stable_multiway_sort() {
        let mut versions = vec!["2.0.0", "1.0.1", "2.0.0~rc1", "1.0.0"];
        versions.sort_by(|a, b| compare(a, b));
        assert_eq!(versions, vec!["1.0.0", "1.0.1", "2.0.0~rc1", "2.0.0"]);
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer("1.0.1", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.1"));
    }
}
