//! Decibel fix tables.
//!
//! A decibel fix overrides a driver's (missing or lying) decibel
//! information for one element: a strictly increasing list of
//! `step → dB` points, linearly interpolated between the listed
//! steps.

//---------------------------------------------------------------------------------------------------- use
use crate::error::Error;
use crate::macros::warn2;
use crate::mixer::backend::Rounding;

//---------------------------------------------------------------------------------------------------- DecibelFix
/// A resolved decibel fix: one centibel value per step in
/// `[min_step, max_step]`.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecibelFix {
	/// The element name this fix applies to.
	pub name: String,
	/// First step covered.
	pub min_step: i64,
	/// Last step covered.
	pub max_step: i64,
	/// Centibels per step, indexed by `step - min_step`.
	pub db_values: Vec<i64>,
}

impl DecibelFix {
	/// Build a fix from the configuration's `db-values` points
	/// (`step → centibel`, strictly monotone in both columns).
	///
	/// Steps between listed points get linearly interpolated values.
	pub fn from_points(name: &str, points: &[(i64, i64)]) -> Result<Self, Error> {
		if points.is_empty() {
			return Err(Error::Invalid);
		}

		for pair in points.windows(2) {
			if pair[1].0 <= pair[0].0 || pair[1].1 <= pair[0].1 {
				warn2!("decibel fix for '{name}' is not strictly monotone");
				return Err(Error::Invalid);
			}
		}

		let min_step = points[0].0;
		let max_step = points[points.len() - 1].0;
		let mut db_values = Vec::with_capacity((max_step - min_step + 1) as usize);

		for pair in points.windows(2) {
			let (s0, d0) = pair[0];
			let (s1, d1) = pair[1];

			for step in s0..s1 {
				db_values.push(d0 + (d1 - d0) * (step - s0) / (s1 - s0));
			}
		}
		db_values.push(points[points.len() - 1].1);

		Ok(Self {
			name: name.to_owned(),
			min_step,
			max_step,
			db_values,
		})
	}

	/// Centibels at `step` (clamped into the covered range).
	pub fn db_at(&self, step: i64) -> i64 {
		let step = step.clamp(self.min_step, self.max_step);
		self.db_values[(step - self.min_step) as usize]
	}

	/// The step whose centibel value is closest to `db` from the
	/// requested side. Also reports the centibel value at that step.
	///
	/// Rounding up picks the lowest step with `db_at(step) >= db`;
	/// rounding down picks the highest step with `db_at(step) <= db`.
	pub fn step_for_db(&self, db: i64, rounding: Rounding) -> (i64, i64) {
		// db_values is strictly increasing, so binary search works.
		let idx = match self.db_values.binary_search(&db) {
			Ok(i) => i,
			Err(insert) => match rounding {
				Rounding::Up   => insert.min(self.db_values.len() - 1),
				Rounding::Down => insert.saturating_sub(1),
			},
		};

		let step = self.min_step + idx as i64;
		(step, self.db_values[idx])
	}

	/// Truncate the covered range from above (volume limits).
	pub fn limit_max_step(&mut self, max_step: i64) {
		if max_step >= self.max_step {
			return;
		}

		self.max_step = max_step.max(self.min_step);
		self.db_values.truncate((self.max_step - self.min_step + 1) as usize);
	}

	/// Centibels at the lowest covered step.
	pub fn min_db(&self) -> i64 {
		self.db_values[0]
	}

	/// Centibels at the highest covered step.
	pub fn max_db(&self) -> i64 {
		self.db_values[self.db_values.len() - 1]
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn interpolates_between_points() {
		let fix = DecibelFix::from_points("PCM", &[(0, -4_000), (4, 0)]).unwrap();
		assert_eq!(fix.db_values, vec![-4_000, -3_000, -2_000, -1_000, 0]);
		assert_eq!(fix.db_at(2), -2_000);
		assert_eq!(fix.db_at(100), 0);
	}

	#[test]
	fn rejects_non_monotone() {
		assert!(DecibelFix::from_points("x", &[(0, 0), (1, 0)]).is_err());
		assert!(DecibelFix::from_points("x", &[(1, 0), (0, 100)]).is_err());
		assert!(DecibelFix::from_points("x", &[]).is_err());
	}

	#[test]
	fn step_lookup_rounds() {
		let fix = DecibelFix::from_points("PCM", &[(0, -4_000), (4, 0)]).unwrap();

		// Exact hit.
		assert_eq!(fix.step_for_db(-2_000, Rounding::Up), (2, -2_000));
		// Between steps: up picks the louder step, down the quieter.
		assert_eq!(fix.step_for_db(-1_500, Rounding::Up), (3, -1_000));
		assert_eq!(fix.step_for_db(-1_500, Rounding::Down), (2, -2_000));
	}

	#[test]
	fn limit_truncates() {
		let mut fix = DecibelFix::from_points("PCM", &[(0, -4_000), (4, 0)]).unwrap();
		fix.limit_max_step(2);
		assert_eq!(fix.max_step, 2);
		assert_eq!(fix.max_db(), -2_000);
	}
}
