//! Vessel Eval: the evaluator core of the Vessel language.
//!
//! Three layers above the `vessel-core` value model:
//!
//! - `engine` + `stacks`: one interpreter instance — data stack, chunk
//!   stack, thrown slot, frame chain, recursion probe
//! - `feed` + `frame` + `step` + `invoke` + `path`: the evaluator — input
//!   feeds (array or variadic, with splice and reification), call
//!   frames, the classify/dispatch loop with lookback and set-word
//!   deferral, argument fulfilment with refinement pickup, path walking
//! - `throw` + `error`: non-local flow — the value-bearing throw channel
//!   and the fail/trap escape with RAII resource release
//!
//! `host` holds the entry points (`do_array_at`, `do_next`, `do_va`,
//! `apply_only`, `eval_value`, frames); `natives` the minimal native
//! library; `funcs` function generation and specialization.

pub mod engine;
pub mod error;
pub mod feed;
pub mod frame;
pub mod funcs;
pub mod host;
mod invoke;
pub mod natives;
mod path;
mod stacks;
mod step;
pub mod throw;

pub use engine::{Engine, EngineConfig};
pub use error::{VesselError, error_id, error_message, fail, fail_with, make_error};
pub use feed::Feed;
pub use frame::{ArgHome, EvalFlags, Frame};
pub use funcs::{analyze_spec, make_function, specialize};
pub use host::{Outcome, Step, VaOutcome};
pub use invoke::{Dispatch, Dispatcher};
pub use natives::make_lib;
pub use throw::Thrown;
