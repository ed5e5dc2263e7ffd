//! Corpus readers.
//!
//! Every reader turns file contents into a sequence of [`Utterance`]s: the
//! symbol stream for the parser, the gold-standard tree (where the format
//! provides one), and the verbatim source text. Utterances always end with
//! an `EoUtterance` marker in the symbol stream.

pub mod error;
pub mod loopconf;
pub mod penn;
pub mod plain;

use ccl_common::{InputSymbol, SynTree};

pub use error::CorpusError;
pub use loopconf::{Action, InputType, LoopConf, LoopEntry};
pub use penn::PennCorpus;

/// One utterance as read from a corpus.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub symbols: Vec<InputSymbol>,
    pub gold: Option<SynTree>,
    pub source: String,
}
