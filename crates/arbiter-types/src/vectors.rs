//! Request and grant line bundles.
//!
//! Both are [`BitVector`]s underneath, but they are distinct types so the
//! compiler rejects a request where a grant is expected (and vice versa).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits::{BitVector, BitsError};

/// Generates a newtype wrapper around [`BitVector`] with standard derives.
macro_rules! define_vector {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(BitVector);

        impl $name {
            /// Create an all-zero vector of the given width.
            ///
            /// # Errors
            ///
            /// Returns [`BitsError::ZeroWidth`] if `width` is 0.
            pub fn zeros(width: usize) -> Result<Self, BitsError> {
                BitVector::zeros(width).map(Self)
            }

            /// Create a vector from the low `width` bits of `value`.
            ///
            /// # Errors
            ///
            /// See [`BitVector::from_u64`].
            pub fn from_u64(width: usize, value: u64) -> Result<Self, BitsError> {
                BitVector::from_u64(width, value).map(Self)
            }

            /// Wrap an existing bit vector.
            pub const fn from_bits(bits: BitVector) -> Self {
                Self(bits)
            }

            /// Borrow the underlying bit vector.
            pub const fn bits(&self) -> &BitVector {
                &self.0
            }

            /// Unwrap into the underlying bit vector.
            pub fn into_bits(self) -> BitVector {
                self.0
            }

            /// Return the number of lines in this bundle.
            pub const fn width(&self) -> usize {
                self.0.width()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = BitsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl From<BitVector> for $name {
            fn from(bits: BitVector) -> Self {
                Self(bits)
            }
        }

        impl AsRef<BitVector> for $name {
            fn as_ref(&self) -> &BitVector {
                &self.0
            }
        }
    };
}

define_vector! {
    /// The request lines: bit `i` set means requester `i` wants the resource.
    RequestVector
}

define_vector! {
    /// The grant lines: bit `i` set means requester `i` holds the resource.
    ///
    /// A correct arbiter never sets more than one bit.
    GrantVector
}

impl GrantVector {
    /// Return `true` if at most one grant line is asserted.
    pub fn is_exclusive(&self) -> bool {
        self.0.count_ones() <= 1
    }

    /// Return the index of the granted requester, if exactly one is granted.
    pub fn granted(&self) -> Option<usize> {
        if self.0.count_ones() == 1 {
            self.0.lowest_set()
        } else {
            None
        }
    }
}
