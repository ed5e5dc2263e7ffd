use std::fmt;

use serde::Serialize;

/// Every punctuation class recognized by the corpus readers.
///
/// `EoUtterance` is not a real punctuation mark; it is the marker the
/// readers emit when an utterance is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PunctKind {
    EoUtterance,
    FullStop,
    Question,
    Exclamation,
    SemiColon,
    Dash,
    Colon,
    Comma,
    Ellipsis,
    LeftParen,
    RightParen,
    DoubleQuote,
    LeftDoubleQuote,
    RightDoubleQuote,
    SingleQuote,
    LeftSingleQuote,
    RightSingleQuote,
    Hyphen,
    HeadlineStop,
    Currency,
}

impl PunctKind {
    /// Does this mark terminate the utterance?
    pub fn is_end_of_utterance(self) -> bool {
        self == PunctKind::EoUtterance
    }

    /// Terminating punctuation: the marks that typically end a sentence.
    pub fn is_terminating(self) -> bool {
        matches!(
            self,
            PunctKind::FullStop
                | PunctKind::Question
                | PunctKind::Exclamation
                | PunctKind::HeadlineStop
        )
    }

    /// Stopping punctuation suppresses linking across it and triggers a
    /// block learning event on the adjacent side.
    pub fn is_stopping(self) -> bool {
        matches!(
            self,
            PunctKind::FullStop
                | PunctKind::Question
                | PunctKind::Exclamation
                | PunctKind::HeadlineStop
                | PunctKind::SemiColon
                | PunctKind::Comma
                | PunctKind::Dash
        )
    }
}

impl fmt::Display for PunctKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PunctKind::EoUtterance => "<EoU>",
            PunctKind::FullStop => ".",
            PunctKind::Question => "?",
            PunctKind::Exclamation => "!",
            PunctKind::SemiColon => ";",
            PunctKind::Dash => "--",
            PunctKind::Colon => ":",
            PunctKind::Comma => ",",
            PunctKind::Ellipsis => "...",
            PunctKind::LeftParen => "(",
            PunctKind::RightParen => ")",
            PunctKind::DoubleQuote => "\"",
            PunctKind::LeftDoubleQuote => "``",
            PunctKind::RightDoubleQuote => "''",
            PunctKind::SingleQuote => "'",
            PunctKind::LeftSingleQuote => "`",
            PunctKind::RightSingleQuote => "'",
            PunctKind::Hyphen => "-",
            PunctKind::HeadlineStop => "-",
            PunctKind::Currency => "$",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_covers_terminating() {
        for kind in [
            PunctKind::FullStop,
            PunctKind::Question,
            PunctKind::Exclamation,
            PunctKind::HeadlineStop,
        ] {
            assert!(kind.is_terminating());
            assert!(kind.is_stopping());
        }
    }

    #[test]
    fn comma_stops_but_does_not_terminate() {
        assert!(PunctKind::Comma.is_stopping());
        assert!(!PunctKind::Comma.is_terminating());
    }

    #[test]
    fn colon_is_neither() {
        assert!(!PunctKind::Colon.is_stopping());
        assert!(!PunctKind::Colon.is_terminating());
    }
}
