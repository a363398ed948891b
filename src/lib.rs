//! Single-pass front end for the Simple language.
//!
//! Source text is translated directly into a sea-of-nodes intermediate
//! representation; there is no syntax tree. The parser threads a current
//! control node and a current scope while it descends, emitting data,
//! control and memory nodes leaves-first through a peephole pipeline.
//! Control-flow joins and loop headers insert φ-nodes as they are parsed,
//! and struct fields get their own memory chains via alias pseudo-variables
//! that ride the ordinary scope machinery.
//!
//! Everything that is per-compilation — node arena, interned types, struct
//! registry, alias counter, peephole worklist — is owned by the
//! [`parse::Parser`] and the caller-provided [`types::TypeStore`], so
//! independent compilations never share state.

pub mod ir;
pub mod parse;
pub mod types;
