//! # The HIR Refinement Passes
//!
//! Each pass consumes a HIR satisfying its entry invariant, mutates the tree
//! in place, and establishes the exit invariant the next pass relies on:
//!
//! | Pass | Module | Establishes |
//! |---|---|---|
//! | 0 | [`build`] | skeletal HIR, all refinement unions unresolved |
//! | 1 | [`register`] | every struct/enum definition holds its type table ID |
//! | 2 | [`resolve`] | identifiers resolved; impl table built |
//! | 3 | [`finalize_types`] | field/variant types linked into the `TypeContext` |
//! | 4 | [`resolve_annotations`] | every annotation `Resolved`; consts evaluated |
//! | 5 | [`trait_check`] | impls validated against trait signatures |
//! | 6 | [`check`] | every expression annotated with `ExprInfo` |
//! | 7 | [`link_control_flow`] | break/continue bound to their loop |
//! | 8 | [`exit_check`] | `exit` only as the final statement of `main` |

pub mod build;
pub mod check;
pub mod exit_check;
pub mod finalize_types;
pub mod link_control_flow;
pub mod register;
pub mod resolve;
pub mod resolve_annotations;
pub mod trait_check;
