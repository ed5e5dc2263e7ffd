// Shared vocabulary of the CCL parser workspace.

pub mod config;
pub mod punct;
pub mod side;
pub mod symbol;
pub mod syntree;
pub mod trace;

pub use config::Config;
pub use punct::PunctKind;
pub use side::Side;
pub use symbol::InputSymbol;
pub use syntree::{NodeId, SynTree};
pub use trace::{Trace, TraceBits};
