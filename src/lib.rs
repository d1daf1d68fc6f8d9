//! Audio device core of a userspace sound server.
//!
//! This crate is the object model and control/data plumbing for
//! *sources* (capture devices) with their *source outputs*
//! (per-stream consumers), *sinks* (playback devices) with their
//! *sink inputs*, and the *port-and-path* mixer abstraction that
//! binds a device to its hardware mixer controls.
//!
//! It is the part of a sound server where mixing, routing,
//! volume propagation and latency negotiation meet: split
//! control-thread/IO-thread state, deferred hardware volume
//! application, flat volume sharing across trees of virtual
//! devices, and the move/rewind/passthrough lifecycle machinery.
//!
//! The event loop, resampler algorithm, hardware drivers and the
//! configuration file parser are external collaborators behind
//! the seams in [`device`], [`resampler`] and [`mixer`].

//---------------------------------------------------------------------------------------------------- Lints
#![forbid(
	future_incompatible,
	let_underscore,
	break_with_label_and_loop,
	coherence_leak_check,
	duplicate_macro_attributes,
	exported_private_dependencies,
	for_loops_over_fallibles,
	large_assignments,
	overlapping_range_endpoints,
	semicolon_in_expressions_from_macros,
	redundant_semicolons,
	unconditional_recursion,
	unused_allocation,
	unused_braces,
	unused_doc_comments,
	unused_labels,
	unused_unsafe,
	while_true,
	keyword_idents,
	non_ascii_idents,
	noop_method_call,
	unreachable_pub,
	single_use_lifetimes,
	unused_mut,
)]
#![deny(
	missing_docs,
	deprecated,
	unused_comparisons,
	nonstandard_style,
)]
#![allow(
	clippy::module_name_repetitions,
	clippy::multiple_inherent_impl,
	clippy::type_complexity,
	clippy::too_many_lines,
	clippy::float_arithmetic,
	clippy::cast_possible_truncation,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
)]

#[cfg(not(any(target_pointer_width = "64", target_pointer_width = "32")))]
compile_error!("resona is only compatible with 64/32-bit CPUs");

//---------------------------------------------------------------------------------------------------- Public API
pub mod sample;
pub mod channel;
pub mod format;
pub mod chunk;
pub mod memblockq;
pub mod resampler;
pub mod mixer;
pub mod card;
pub mod device;
pub mod stream;
pub mod hook;

mod core;
pub use crate::core::{Core,CoreConfig,EventKind,Facility,SubscriptionEvent};

mod error;
pub use error::Error;

//---------------------------------------------------------------------------------------------------- Private Usage
mod macros;

//---------------------------------------------------------------------------------------------------- Test Init Helpers
// These are helper functions used for testing throughout the codebase.
#[cfg(test)]
pub(crate) mod tests;
