use std::fmt;

/// An error in corpus input or in a loop-configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusError {
    pub kind: CorpusErrorKind,
    /// 1-based line where the problem was found, if known.
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorpusErrorKind {
    /// A bracketed treebank object was malformed.
    MalformedObject(String),
    /// A loop-configuration line could not be parsed.
    BadLoopEntry(String),
}

impl CorpusError {
    pub fn malformed(message: impl Into<String>, line: Option<usize>) -> CorpusError {
        CorpusError {
            kind: CorpusErrorKind::MalformedObject(message.into()),
            line,
        }
    }

    pub fn bad_loop_entry(message: impl Into<String>, line: usize) -> CorpusError {
        CorpusError {
            kind: CorpusErrorKind::BadLoopEntry(message.into()),
            line: Some(line),
        }
    }
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CorpusErrorKind::MalformedObject(msg) => write!(f, "malformed input object: {msg}")?,
            CorpusErrorKind::BadLoopEntry(msg) => write!(f, "bad loop entry: {msg}")?,
        }
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CorpusError {}
