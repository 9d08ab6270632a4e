//! CLI command handlers, one file per command.

mod batch;
mod check;
mod completions;
mod convert;
mod man;
mod start;
mod stop;

pub use batch::run_batch;
pub use check::run_check;
pub use completions::run_completions;
pub use convert::{run_convert, ConvertArgs};
pub use man::run_man;
pub use start::run_start;
pub use stop::run_stop;
