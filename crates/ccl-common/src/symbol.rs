use serde::Serialize;

use crate::punct::PunctKind;

/// One element of the symbol stream handed to the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InputSymbol {
    /// A word, with any extra labels (e.g. a part-of-speech tag).
    Unit { name: String, labels: Vec<String> },
    /// A punctuation mark.
    Punct(PunctKind),
}

impl InputSymbol {
    pub fn unit(name: &str) -> InputSymbol {
        InputSymbol::Unit {
            name: name.to_string(),
            labels: Vec::new(),
        }
    }

    pub fn unit_with_label(name: &str, label: &str) -> InputSymbol {
        InputSymbol::Unit {
            name: name.to_string(),
            labels: vec![label.to_string()],
        }
    }
}
