// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use itertools::Itertools;
use smallvec::SmallVec;

/// Most vertex fans and faces in a mesh have four or fewer elements, so this
/// avoids a heap allocation in the common case.
pub type SVec<T> = SmallVec<[T; 4]>;

/// Rotates the given iterator by shifting all elements `shift` positions
/// forward. Any elements that would be out of bounds are instead put at the
/// beginning.
///
/// This method requires passing the `len` as a separate parameter. This is
/// often known beforehand or can be found by calling .size_hint() for an
/// ExactSizeIterator.
pub fn rotate_iter<T>(
    it: impl Iterator<Item = T> + Clone,
    shift: usize,
    len: usize,
) -> impl Iterator<Item = T> {
    it.cycle().dropping(shift).take(len)
}

/// Returns the rotation of `cycle` that starts at its minimum element. Two
/// cyclic sequences describe the same cycle iff their canonical rotations are
/// equal.
pub fn canonical_rotation<T: Ord + Copy>(cycle: &[T]) -> Vec<T> {
    match cycle.iter().position_min() {
        Some(shift) => rotate_iter(cycle.iter().copied(), shift, cycle.len()).collect(),
        None => Vec::new(),
    }
}

/// Transmutes a vector of `T`s into a vector of `U`s.
///
/// # Safety
/// This is only safe when `T` and `U` have the same size and alignment, plus
/// all the additional safety considerations required when calling
/// `transmute::<T,U>`
pub unsafe fn transmute_vec<T, U>(v: Vec<T>) -> Vec<U> {
    let mut v = std::mem::ManuallyDrop::new(v);
    let ptr = v.as_mut_ptr();
    let len = v.len();
    let cap = v.capacity();

    Vec::from_raw_parts(ptr as *mut U, len, cap)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rotations() {
        assert_eq!(
            rotate_iter([1, 2, 3, 4].into_iter(), 1, 4).collect_vec(),
            &[2, 3, 4, 1]
        );
        assert_eq!(canonical_rotation(&[7, 3, 9, 5]), &[3, 9, 5, 7]);
        assert_eq!(canonical_rotation(&[9, 5, 7, 3]), &[3, 9, 5, 7]);
        assert!(canonical_rotation::<u32>(&[]).is_empty());
    }
}
