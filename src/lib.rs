// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # bnb-adopt
//! `bnb-adopt` is a generic engine for solving Distributed Constraint
//! Optimization Problems (DCOPs) with BnB-ADOPT: an asynchronous, complete
//! branch-and-bound search carried out cooperatively by one agent per
//! variable over a depth-first pseudo-tree.
//!
//! The engine is generic over the variables' domain (`Value`) and the
//! utilities used to measure assignment cost (`Utility`), and is agnostic to
//! how the pseudo-tree and the constraint network were built — callers
//! supply both (see `pseudotree` and `space`) along with a lower-bound
//! heuristic (`heuristic`, trivially all-zero by default).
//!
//! ## Layout
//! - `value`, `error` — the capability sets the engine requires of `V`/`U`,
//!   and the error taxonomy it can raise.
//! - `pseudotree`, `space`, `heuristic` — the static problem description
//!   handed to each variable once, before search begins.
//! - `context`, `bounds`, `message` — the per-variable working state: the
//!   ancestor-assignment context store, the per-child bounds table, and the
//!   three wire message shapes that carry both between variables.
//! - `variable` — the Variable Engine: the state machine that actually runs
//!   BnB-ADOPT for one variable.
//! - `version` — the seam through which a future search variant could be
//!   plugged in next to `version::Original` without forking `variable`.
//! - `dispatcher`, `transport` — the Agent Dispatcher that routes messages to
//!   the variables an agent owns, and the `crossbeam`-channel transport that
//!   runs a whole multi-agent system to completion.
pub mod bounds;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod heuristic;
pub mod message;
pub mod pseudotree;
pub mod space;
pub mod transport;
pub mod value;
pub mod variable;
pub mod version;

pub use error::EngineError;
pub use value::{Utility, Value};
