//! Streaming SQL compiler front end.
//!
//! [`StreamCompiler`] owns a session catalog and the parse → analyze → optimize → window
//! rewrite pipeline; [`StreamingView`] is a compiled (or composed) plan bound to it.

mod command;
mod compiler;
mod planner_facade;
mod session;
mod view;

pub mod expr;
pub mod repl;

pub use command::{CatalogCommands, CommandContext, CommandExecutor};
pub use compiler::{StreamCompiler, StreamCompilerBuilder};
pub use view::{BatchPlan, GroupedView, StreamingView};
