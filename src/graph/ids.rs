use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::index_vec::Idx;

macro_rules! define_id {
    ($name:ident, $raw:ty) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub $raw);

        impl $name {
            pub const fn new(raw: $raw) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> $raw {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, stringify!($name))?;
                f.debug_tuple("").field(&self.0).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Idx for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_usize(idx: usize) -> Self {
                Self(idx as $raw)
            }
        }
    };
}

define_id!(GlobalId, u64);
define_id!(LocalId, u32);
define_id!(Rank, u32);

impl Rank {
    /// The next rank on the ring `0 -> 1 -> ... -> size-1 -> 0`.
    pub fn next(self, size: usize) -> Rank {
        Rank(((self.0 as usize + 1) % size) as u32)
    }

    /// The previous rank on the ring.
    pub fn prev(self, size: usize) -> Rank {
        Rank(((self.0 as usize + size - 1) % size) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_neighbors_wrap() {
        assert_eq!(Rank::new(0).next(3), Rank::new(1));
        assert_eq!(Rank::new(2).next(3), Rank::new(0));
        assert_eq!(Rank::new(0).prev(3), Rank::new(2));
        assert_eq!(Rank::new(0).next(1), Rank::new(0));
    }
}
