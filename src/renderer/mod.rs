//! Template execution
//!
//! Nodes run against an [`ExecContext`] holding the bindings, the compiled
//! template table and the layout scope of the current render. Expressions
//! evaluate to `serde_json` values.

mod context;
mod eval;
mod pool;

pub use context::{render_nodes, ExecContext, ViewData, MAX_INCLUDE_DEPTH};
pub use eval::{as_priority, evaluate, truthy, type_name, write_value, EvalError, Lookup};
pub use pool::{BufferPool, PooledBuffer};
