// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt;

/// First position where the two outputs diverge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    pub reference: i16,
    pub accelerator: i16,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: Result mismatch at index {}: reference {} != accelerator {}",
            self.index, self.reference, self.accelerator
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Match,
    Mismatch(Mismatch),
}

impl Validation {
    pub fn passed(&self) -> bool {
        *self == Validation::Match
    }
}

/// Compares the outputs element by element and stops at the first difference.
///
/// Outputs of different lengths mismatch at the end of the shorter one, with
/// the missing value reported as 0.
pub fn validate(accelerator: &[i16], reference: &[i16]) -> Validation {
    let position = accelerator.iter().zip(reference).position(|(a, r)| a != r);
    if let Some(index) = position {
        return Validation::Mismatch(Mismatch {
            index,
            reference: reference[index],
            accelerator: accelerator[index],
        });
    }
    if accelerator.len() != reference.len() {
        let index = accelerator.len().min(reference.len());
        return Validation::Mismatch(Mismatch {
            index,
            reference: reference.get(index).copied().unwrap_or(0),
            accelerator: accelerator.get(index).copied().unwrap_or(0),
        });
    }
    Validation::Match
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_mismatch() {
        let reference: Vec<i16> = (0..64).collect();
        let mut accelerator = reference.clone();
        accelerator[37] = -5;
        accelerator[50] = 7;
        let validation = validate(&accelerator, &reference);
        assert_eq!(
            validation,
            Validation::Mismatch(Mismatch {
                index: 37,
                reference: 37,
                accelerator: -5,
            })
        );
        assert!(!validation.passed());
    }

    #[test]
    fn identical() {
        let reference: Vec<i16> = (0..64).map(|i| i * 3 - 90).collect();
        assert!(validate(&reference.clone(), &reference).passed());
    }

    #[test]
    fn length_difference() {
        assert_eq!(
            validate(&[1, 2], &[1, 2, 3]),
            Validation::Mismatch(Mismatch {
                index: 2,
                reference: 3,
                accelerator: 0,
            })
        );
    }

    #[test]
    fn message() {
        let mismatch = Mismatch {
            index: 4,
            reference: 10,
            accelerator: 11,
        };
        assert_eq!(
            mismatch.to_string(),
            "Error: Result mismatch at index 4: reference 10 != accelerator 11"
        );
    }
}
