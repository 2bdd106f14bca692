use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Option flags applied when a pattern is compiled
///
/// The numeric encoding (see [`PatternOptions::bits`]) is the one used by
/// transcript viewers that store search preferences as an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOptions {
    /// Letters match regardless of case
    pub case_insensitive: bool,
    /// `.` also matches `\n`
    pub dot_all: bool,
    /// Whitespace in the pattern is ignored and `#` starts a comment
    pub extended: bool,
    /// Quantifiers are lazy by default and `?` makes them greedy
    pub lazy: bool,
    /// `^` and `$` match at the start and end of every line
    pub multiline: bool,
}

impl PatternOptions {
    pub const CASE_INSENSITIVE: u32 = 1;
    pub const DOT_ALL: u32 = 2;
    pub const EXTENDED: u32 = 4;
    pub const LAZY: u32 = 8;
    pub const MULTILINE: u32 = 16;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }

    /// Decodes the numeric flag encoding; unknown bits are ignored
    pub fn from_bits(bits: u32) -> Self {
        Self {
            case_insensitive: bits & Self::CASE_INSENSITIVE != 0,
            dot_all: bits & Self::DOT_ALL != 0,
            extended: bits & Self::EXTENDED != 0,
            lazy: bits & Self::LAZY != 0,
            multiline: bits & Self::MULTILINE != 0,
        }
    }

    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.case_insensitive {
            bits |= Self::CASE_INSENSITIVE;
        }
        if self.dot_all {
            bits |= Self::DOT_ALL;
        }
        if self.extended {
            bits |= Self::EXTENDED;
        }
        if self.lazy {
            bits |= Self::LAZY;
        }
        if self.multiline {
            bits |= Self::MULTILINE;
        }
        bits
    }

    pub(crate) fn builder(&self, pattern: &str) -> RegexBuilder {
        let mut builder = RegexBuilder::new(pattern);
        builder
            .case_insensitive(self.case_insensitive)
            .dot_matches_new_line(self.dot_all)
            .ignore_whitespace(self.extended)
            .swap_greed(self.lazy)
            .multi_line(self.multiline);
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_roundtrip_every_flag() {
        for bits in 0..32 {
            assert_eq!(PatternOptions::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_unknown_bits_ignored() {
        let options = PatternOptions::from_bits(1 | 64);
        assert!(options.case_insensitive);
        assert_eq!(options.bits(), 1);
    }

    #[test]
    fn test_builder_applies_flags() {
        let options = PatternOptions {
            dot_all: true,
            multiline: true,
            ..PatternOptions::default()
        };
        let regex = options.builder("^a.b$").build().unwrap();
        assert!(regex.is_match("x\na\nb"));

        let plain = PatternOptions::default().builder("^a.b$").build().unwrap();
        assert!(!plain.is_match("x\na\nb"));
    }
}
