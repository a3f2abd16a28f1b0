//! Internal implementation details.

pub(crate) mod destruction;

pub(crate) use destruction::DestructionBag;
