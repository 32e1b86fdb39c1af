//! Hashing and comparing pointers by what they point to.
//!
//! Keys of hash containers are sometimes owning pointers, such as `Box<str>` or `Arc<Config>`, while lookups are
//! meant to find the equal value rather than the same allocation. The functors of this module look through the
//! pointer, and treat the null pointer as a value of its own, equal only to itself.

use core::{
    hash::{BuildHasher, Hash, Hasher},
    ops::Deref,
};

/// A nullable pointer, whose pointee can be observed.
pub trait Pointer {
    /// The type pointed to.
    type Target: ?Sized;

    /// Returns the pointee, or None if the pointer is null.
    fn pointee(&self) -> Option<&Self::Target>;

    /// Returns the address pointed to, or 0 if the pointer is null.
    fn address(&self) -> usize;
}

impl<P: Deref> Pointer for Option<P> {
    type Target = P::Target;

    fn pointee(&self) -> Option<&P::Target> { self.as_deref() }

    fn address(&self) -> usize {
        self.as_deref().map_or(0, |pointee| (pointee as *const P::Target).cast::<()>() as usize)
    }
}

/// Hashes pointers by their pointee, with the hasher built by `S`.
///
/// The null pointer hashes to 0.
#[derive(Clone, Debug, Default)]
pub struct PointeeHash<S>(S);

impl<S> PointeeHash<S> {
    /// Creates an instance.
    pub const fn new(builder: S) -> Self { Self(builder) }
}

impl<S: BuildHasher> PointeeHash<S> {
    /// Returns the hash of the pointee of `pointer`, or 0 if null.
    pub fn hash<P>(&self, pointer: &P) -> u64
        where
            P: Pointer,
            P::Target: Hash,
    {
        pointer.pointee().map_or(0, |pointee| self.0.hash_one(pointee))
    }
}

/// Compares pointers by their pointee.
///
/// Two null pointers are equal, a null pointer is different from any other.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointeeEq;

impl PointeeEq {
    /// Returns whether `left` and `right` point to equal values, or are both null.
    pub fn eq<P>(&self, left: &P, right: &P) -> bool
        where
            P: Pointer,
            P::Target: PartialEq,
    {
        match (left.pointee(), right.pointee()) {
            (Some(left), Some(right)) => left == right,
            _ => left.address() == right.address(),
        }
    }
}

/// Key wrapper, hashing and comparing the pointer `P` by its pointee.
///
/// ```
/// use std::{collections::HashSet, rc::Rc};
///
/// use privheap_core::ByPointee;
///
/// let mut set = HashSet::new();
///
/// set.insert(ByPointee(Some(Rc::new(String::from("one")))));
/// set.insert(ByPointee(None));
///
/// assert!(set.contains(&ByPointee(Some(Rc::new(String::from("one"))))));
/// assert!(set.contains(&ByPointee(None)));
/// assert!(!set.contains(&ByPointee(Some(Rc::new(String::from("two"))))));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ByPointee<P>(pub P);

impl<P> Hash for ByPointee<P>
    where
        P: Pointer,
        P::Target: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.0.pointee() {
            Some(pointee) => pointee.hash(state),
            None => 0usize.hash(state),
        }
    }
}

impl<P> PartialEq for ByPointee<P>
    where
        P: Pointer,
        P::Target: PartialEq,
{
    fn eq(&self, other: &Self) -> bool { PointeeEq.eq(&self.0, &other.0) }
}

impl<P> Eq for ByPointee<P>
    where
        P: Pointer,
        P::Target: Eq,
{}
