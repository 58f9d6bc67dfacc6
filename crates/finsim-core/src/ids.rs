use core::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RigId(pub u32);
impl fmt::Display for RigId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "RigId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetId(pub u32);
impl fmt::Display for TargetId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "TargetId({})", self.0) } }
