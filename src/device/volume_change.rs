//! The deferred hardware volume change queue.
//!
//! Devices with deferred volume never write the mixer directly
//! from a control request. Instead each requested hardware volume
//! is scheduled at a point in the future that corresponds to the
//! audio the listener is hearing *now*, biased by a safety margin:
//! increases run a bit late, decreases a bit early, so a
//! mis-estimated latency clips in the quiet direction.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::ChannelVolumes;
use crate::macros::trace2;
use crate::sample::Usec;
use std::collections::VecDeque;

//---------------------------------------------------------------------------------------------------- VolumeChange
/// One scheduled hardware volume.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct VolumeChange {
	/// When to commit, on the IO thread's monotonic clock.
	pub at: Usec,
	/// What to commit.
	pub hw_volume: ChannelVolumes,
}

//---------------------------------------------------------------------------------------------------- VolumeChangeQueue
/// The per-device queue of pending hardware volume changes.
///
/// INVARIANT: entries are strictly ordered by schedule time and
/// adjacent entries are at least `safety_margin` apart.
#[derive(Debug)]
pub struct VolumeChangeQueue {
	changes: VecDeque<VolumeChange>,
	/// Minimum spacing between adjacent changes.
	safety_margin: Usec,
	/// Constant shift added to every schedule.
	extra_delay: i64,
}

impl VolumeChangeQueue {
	/// Default safety margin: 8 ms.
	pub const DEFAULT_SAFETY_MARGIN: Usec = 8_000;

	/// An empty queue.
	pub fn new(safety_margin: Usec, extra_delay: i64) -> Self {
		Self {
			changes: VecDeque::with_capacity(8),
			safety_margin,
			extra_delay,
		}
	}

	/// How many changes are pending.
	pub fn len(&self) -> usize {
		self.changes.len()
	}

	/// Is the queue empty?
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}

	/// The pending changes, earliest first.
	pub fn pending(&self) -> impl Iterator<Item = &VolumeChange> {
		self.changes.iter()
	}

	/// Schedule `hw_volume`.
	///
	/// The natural slot is `now + latency + extra_delay` (the point
	/// the audio being captured/played right now becomes audible).
	/// Going up relative to the queue tail pushes the slot to at
	/// least `tail + safety`; going down pulls it to at most
	/// `tail - safety`, superseding every queued change scheduled
	/// at or after the final slot.
	pub fn push(
		&mut self,
		now: Usec,
		latency: Usec,
		hw_volume: ChannelVolumes,
		current_hw: &ChannelVolumes,
	) {
		if self.changes.is_empty() && hw_volume == *current_hw {
			trace2!("volume not changing");
			return;
		}

		let mut at = now
			.saturating_add(latency)
			.saturating_add_signed(self.extra_delay);

		if let Some(tail) = self.changes.back() {
			if hw_volume.avg() > tail.hw_volume.avg() {
				at = at.max(tail.at.saturating_add(self.safety_margin));
			} else {
				at = at.min(tail.at.saturating_sub(self.safety_margin));
			}
		}

		// Changes that would fire at or after the new one are
		// superseded by it.
		while self.changes.back().map(|c| c.at >= at).unwrap_or(false) {
			let dropped = self.changes.pop_back().unwrap();
			trace2!("volume change to {} at {} dropped", dropped.hw_volume.avg().0, dropped.at);
		}

		self.changes.push_back(VolumeChange { at, hw_volume });
	}

	/// Commit every change due at `now` or earlier.
	///
	/// Returns the last committed volume (the caller writes it to
	/// the hardware exactly once per batch) and the delay until
	/// the next pending change, if any remains.
	pub fn apply(&mut self, now: Usec) -> (Option<ChannelVolumes>, Option<Usec>) {
		let mut committed = None;

		while self.changes.front().map(|c| c.at <= now).unwrap_or(false) {
			let c = self.changes.pop_front().unwrap();
			trace2!("volume change to {} at {} written {} usec late", c.hw_volume.avg().0, c.at, now - c.at);
			committed = Some(c.hw_volume);
		}

		let next = self.changes.front().map(|c| c.at - now);
		(committed, next)
	}

	/// Drop everything pending (device going down / rate switch).
	pub fn flush(&mut self) {
		self.changes.clear();
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::Volume;
	use pretty_assertions::assert_eq;

	const SAFETY: Usec = 10_000;

	fn vols(v: f64) -> ChannelVolumes {
		ChannelVolumes::uniform(2, Volume((v * f64::from(Volume::NORM.0)) as u32))
	}

	#[test]
	fn ascending_pushes_space_out_by_safety() {
		let mut q = VolumeChangeQueue::new(SAFETY, 0);
		let current = vols(0.0);
		let t = 1_000_000;

		q.push(t, 0, vols(0.2), &current);
		q.push(t, 0, vols(0.4), &current);
		q.push(t, 0, vols(0.8), &current);

		let times: Vec<Usec> = q.pending().map(|c| c.at).collect();
		assert_eq!(times, vec![t, t + SAFETY, t + 2 * SAFETY]);

		// Property: strictly ordered, gaps >= safety margin.
		for w in times.windows(2) {
			assert!(w[1] - w[0] >= SAFETY);
		}
	}

	#[test]
	fn descending_push_supersedes_later_changes() {
		// The spec's deferred-ordering scenario: 0.3, 0.6, 0.2
		// pushed back to back. 0.6 lands a safety margin after
		// 0.3; the final 0.2 is shifted earlier and supersedes
		// both queued changes, so only it remains.
		let mut q = VolumeChangeQueue::new(SAFETY, 0);
		let current = vols(1.0);
		let t = 1_000_000;

		q.push(t, 0, vols(0.3), &current);
		q.push(t, 0, vols(0.6), &current);

		let times: Vec<Usec> = q.pending().map(|c| c.at).collect();
		assert_eq!(times, vec![t, t + SAFETY]);

		// Pushed a little later: its natural slot would collide
		// with the queued 0.6, so it is pulled earlier instead.
		q.push(t + SAFETY, 0, vols(0.2), &current);

		let pending: Vec<(Usec, u32)> = q.pending().map(|c| (c.at, c.hw_volume.avg().0)).collect();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].0, t);
		assert_eq!(pending[0].1, vols(0.2).avg().0);
	}

	#[test]
	fn apply_commits_in_order_one_write_per_batch() {
		let mut q = VolumeChangeQueue::new(SAFETY, 0);
		let current = vols(0.0);
		let t = 1_000_000;

		q.push(t, 0, vols(0.2), &current);
		q.push(t, 0, vols(0.4), &current);
		q.push(t, 0, vols(0.8), &current);

		// Nothing due yet.
		let (committed, next) = q.apply(t - 1);
		assert_eq!(committed, None);
		assert_eq!(next, Some(1));

		// Two due: one write, carrying the latest.
		let (committed, next) = q.apply(t + SAFETY);
		assert_eq!(committed, Some(vols(0.4)));
		assert_eq!(next, Some(SAFETY));

		// The rest.
		let (committed, next) = q.apply(t + 2 * SAFETY);
		assert_eq!(committed, Some(vols(0.8)));
		assert_eq!(next, None);
		assert!(q.is_empty());
	}

	#[test]
	fn latency_and_extra_delay_shift_the_slot() {
		let mut q = VolumeChangeQueue::new(SAFETY, 2_000);
		let current = vols(0.0);

		q.push(1_000_000, 5_000, vols(0.5), &current);
		assert_eq!(q.pending().next().unwrap().at, 1_007_000);
	}

	#[test]
	fn no_op_push_on_empty_queue_is_dropped() {
		let mut q = VolumeChangeQueue::new(SAFETY, 0);
		let current = vols(0.5);

		q.push(1_000_000, 0, vols(0.5), &current);
		assert!(q.is_empty());
	}

	#[test]
	fn flush_discards_everything() {
		let mut q = VolumeChangeQueue::new(SAFETY, 0);
		q.push(1_000_000, 0, vols(0.5), &vols(0.0));
		q.flush();
		assert!(q.is_empty());
	}
}
