//! Hook lists: the veto/adjust points fired around object
//! creation and stream moves.

//---------------------------------------------------------------------------------------------------- use
use crate::device::{SinkBuilder,SourceBuilder};
use crate::stream::{SinkInput,SinkInputBuilder,SourceOutput,SourceOutputBuilder};

//---------------------------------------------------------------------------------------------------- HookResult
/// What a creation hook decided.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
pub enum HookResult {
	/// Proceed (the hook may have adjusted the candidate).
	#[default]
	Ok,
	/// Abort the operation.
	Cancel,
}

/// A hook over a mutable candidate (builders before `new`).
pub type NewHook<B> = Box<dyn FnMut(&mut B) -> HookResult + Send>;

/// A veto hook over a finished object.
pub type VetoHook<T> = Box<dyn FnMut(&T) -> HookResult + Send>;

/// A notification hook over a finished object.
pub type NotifyHook<T> = Box<dyn FnMut(&T) + Send>;

/// A rescue hook: fired when a move failed, may name another
/// device to retry on before the stream is killed.
pub type RescueHook<T> = Box<dyn FnMut(&T) -> Option<u32> + Send>;

//---------------------------------------------------------------------------------------------------- Hooks
/// All hook lists of a [`crate::core::Core`].
///
/// Creation hooks fire in list order; the first `Cancel` aborts.
#[derive(Default)]
pub struct Hooks {
	/// Source candidate announced.
	pub source_new: Vec<NewHook<SourceBuilder>>,
	/// Source candidate finalized.
	pub source_fixate: Vec<NewHook<SourceBuilder>>,
	/// Sink candidate announced.
	pub sink_new: Vec<NewHook<SinkBuilder>>,
	/// Sink candidate finalized.
	pub sink_fixate: Vec<NewHook<SinkBuilder>>,

	/// Source output candidate announced.
	pub source_output_new: Vec<NewHook<SourceOutputBuilder>>,
	/// Source output candidate finalized.
	pub source_output_fixate: Vec<NewHook<SourceOutputBuilder>>,
	/// Sink input candidate announced.
	pub sink_input_new: Vec<NewHook<SinkInputBuilder>>,
	/// Sink input candidate finalized.
	pub sink_input_fixate: Vec<NewHook<SinkInputBuilder>>,

	/// A source output is about to leave its source.
	pub source_output_move_start: Vec<VetoHook<SourceOutput>>,
	/// A source output arrived on its new source.
	pub source_output_move_finish: Vec<NotifyHook<SourceOutput>>,
	/// A source output's move fell through.
	pub source_output_move_fail: Vec<RescueHook<SourceOutput>>,

	/// A sink input is about to leave its sink.
	pub sink_input_move_start: Vec<VetoHook<SinkInput>>,
	/// A sink input arrived on its new sink.
	pub sink_input_move_finish: Vec<NotifyHook<SinkInput>>,
	/// A sink input's move fell through.
	pub sink_input_move_fail: Vec<RescueHook<SinkInput>>,
}

impl std::fmt::Debug for Hooks {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Hooks").finish_non_exhaustive()
	}
}

/// Fire a list of creation hooks over a candidate.
pub(crate) fn fire_new<B>(hooks: &mut [NewHook<B>], candidate: &mut B) -> HookResult {
	for hook in hooks {
		if hook(candidate) == HookResult::Cancel {
			return HookResult::Cancel;
		}
	}
	HookResult::Ok
}

/// Fire a list of veto hooks over an object.
pub(crate) fn fire_veto<T>(hooks: &mut [VetoHook<T>], object: &T) -> HookResult {
	for hook in hooks {
		if hook(object) == HookResult::Cancel {
			return HookResult::Cancel;
		}
	}
	HookResult::Ok
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
