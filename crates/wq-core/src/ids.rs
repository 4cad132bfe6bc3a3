use core::fmt;
use core::num::NonZeroU32;

/// Compact, stable handle for network objects and segments.
///
/// Stored as index+1 in a `NonZeroU32`, so `Option<Id>` costs no extra
/// space. That matters in the segment arena, where every segment holds
/// two optional neighbor links.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    /// The 0-based index this handle was built from.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// Convenience for indexing slices.
    pub fn usize(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Aliases naming the object class; all share the representation.
pub type NodeId = Id;
pub type LinkId = Id;
pub type TankId = Id;
pub type SpeciesId = Id;
pub type SegId = Id;
