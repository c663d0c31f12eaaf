mod approval;
mod completion;
mod ledger;
mod settlement;
mod stats;

pub use approval::*;
pub use completion::*;
pub use ledger::*;
pub use settlement::*;
pub use stats::*;
