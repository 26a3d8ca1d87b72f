//! Sampling blocks and schedules
//!
//! A sampling block is a set of joint-state coordinate indices that are
//! proposed together in one filter step; a schedule is an ordered list of
//! blocks. Coordinates are laid out per object: indices `6i..6i+3` are
//! object `i`'s translation axes, `6i+3..6i+6` its rotation axes.
//!
//! An operating schedule must cover the full state dimensionality exactly
//! once. Reduced schedules (one object's block while the rest is held
//! fixed) are built internally for staged initialization and are never
//! accepted from configuration.

use crate::types::pose::OBJECT_DOF;
use crate::{Error, Result};

/// An ordered partition of joint-state coordinates into proposal blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingSchedule {
    blocks: Vec<Vec<usize>>,
    dof: usize,
}

impl SamplingSchedule {
    /// Creates a validated operating schedule.
    ///
    /// The union of all blocks must cover `0..dof` exactly once: no gaps,
    /// no duplicated indices, no out-of-range indices, no empty blocks.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] describing the first violation.
    pub fn from_blocks(blocks: Vec<Vec<usize>>, dof: usize) -> Result<Self> {
        if blocks.is_empty() {
            return Err(invalid("sampling_blocks", "schedule contains no blocks"));
        }

        let mut seen = vec![false; dof];
        let mut covered = 0usize;
        for (i, block) in blocks.iter().enumerate() {
            if block.is_empty() {
                return Err(invalid("sampling_blocks", format!("block {} is empty", i)));
            }
            for &coord in block {
                if coord >= dof {
                    return Err(invalid(
                        "sampling_blocks",
                        format!("coordinate {} exceeds state dimensionality {}", coord, dof),
                    ));
                }
                if seen[coord] {
                    return Err(invalid(
                        "sampling_blocks",
                        format!("coordinate {} appears in more than one block", coord),
                    ));
                }
                seen[coord] = true;
                covered += 1;
            }
        }
        if covered != dof {
            return Err(invalid(
                "sampling_blocks",
                format!("blocks cover {} of {} coordinates", covered, dof),
            ));
        }

        Ok(Self { blocks, dof })
    }

    /// One block covering the full joint state: standard (non-blocked)
    /// sampling, used for the full-state initialization step.
    pub fn full_joint(dof: usize) -> Self {
        Self {
            blocks: vec![(0..dof).collect()],
            dof,
        }
    }

    /// One block per object, in object order.
    pub fn per_object(object_count: usize) -> Self {
        Self {
            blocks: (0..object_count)
                .map(|i| (i * OBJECT_DOF..(i + 1) * OBJECT_DOF).collect())
                .collect(),
            dof: object_count * OBJECT_DOF,
        }
    }

    /// A reduced schedule updating only one object's coordinates while the
    /// rest of the joint state is held fixed (staged initialization).
    ///
    /// # Panics
    /// Panics if `object_index` is out of range for `dof`.
    pub fn single_object(object_index: usize, dof: usize) -> Self {
        let start = object_index * OBJECT_DOF;
        assert!(start + OBJECT_DOF <= dof, "object index out of range");
        Self {
            blocks: vec![(start..start + OBJECT_DOF).collect()],
            dof,
        }
    }

    #[inline]
    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    /// Number of blocks in the schedule.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// State dimensionality the schedule is defined over.
    #[inline]
    pub fn dof(&self) -> usize {
        self.dof
    }
}

/// Per-object axis masks of one block: which translation and rotation axes
/// of `object` the block covers.
pub(crate) fn block_axes_for_object(block: &[usize], object: usize) -> ([bool; 3], [bool; 3]) {
    let base = object * OBJECT_DOF;
    let mut translation = [false; 3];
    let mut rotation = [false; 3];
    for &coord in block {
        if coord >= base && coord < base + OBJECT_DOF {
            let axis = coord - base;
            if axis < 3 {
                translation[axis] = true;
            } else {
                rotation[axis - 3] = true;
            }
        }
    }
    (translation, rotation)
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        parameter,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_joint_covers_everything() {
        let schedule = SamplingSchedule::full_joint(12);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.blocks()[0].len(), 12);
    }

    #[test]
    fn test_per_object_partitions_in_order() {
        let schedule = SamplingSchedule::per_object(2);
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.blocks()[0], vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(schedule.blocks()[1], vec![6, 7, 8, 9, 10, 11]);
        assert_eq!(schedule.dof(), 12);
    }

    #[test]
    fn test_validation_accepts_exact_cover() {
        let blocks = vec![vec![0, 1, 2], vec![5, 4, 3]];
        assert!(SamplingSchedule::from_blocks(blocks, 6).is_ok());
    }

    #[test]
    fn test_validation_rejects_gap() {
        let blocks = vec![vec![0, 1, 2], vec![3, 4]];
        assert!(SamplingSchedule::from_blocks(blocks, 6).is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate() {
        let blocks = vec![vec![0, 1, 2], vec![2, 3, 4, 5]];
        assert!(SamplingSchedule::from_blocks(blocks, 6).is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let blocks = vec![vec![0, 1, 2, 3, 4, 6]];
        assert!(SamplingSchedule::from_blocks(blocks, 6).is_err());
    }

    #[test]
    fn test_single_object_block() {
        let schedule = SamplingSchedule::single_object(1, 18);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.blocks()[0], vec![6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_block_axis_masks() {
        let block = vec![6, 7, 8, 10];
        let (t, r) = block_axes_for_object(&block, 1);
        assert_eq!(t, [true, true, true]);
        assert_eq!(r, [false, true, false]);

        let (t0, r0) = block_axes_for_object(&block, 0);
        assert_eq!(t0, [false; 3]);
        assert_eq!(r0, [false; 3]);
    }
}
