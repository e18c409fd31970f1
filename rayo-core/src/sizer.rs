use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use crate::SizeMode;

/// Cost charged for a child that the probe declines to traverse (depth
/// budget exhausted). Keeps deep graphs at a fixed per-reference cost
/// instead of zero.
const OPAQUE_CHILD_COST: u64 = 16;

/// Trait for estimating the memory footprint of cached values.
///
/// The cache invokes this through a [`ValueSizer`] whenever sizing is
/// enabled (a capacity limit is set or heavy-entry tracking is on). The
/// estimate feeds memory accounting and size-ordered eviction; it does not
/// have to be exact, but it must be total (never fail) and deterministic
/// for structurally identical values within one process lifetime.
///
/// # Default Implementation
///
/// The default methods account only for the value's in-place layout
/// (`std::mem::size_of_val`), which is correct for plain-old-data types:
///
/// ```
/// use rayo_core::ByteSized;
///
/// #[derive(Clone)]
/// struct Point {
///     x: f64,
///     y: f64,
/// }
///
/// impl ByteSized for Point {}
/// ```
///
/// # Custom Implementation for Heap Data
///
/// Types that own heap allocations override [`record`](ByteSized::record)
/// and report their children through the probe, which handles depth
/// budgets, sampling, and cycle safety:
///
/// ```
/// use rayo_core::{ByteSized, SizeProbe};
///
/// #[derive(Clone)]
/// struct Document {
///     title: String,
///     lines: Vec<String>,
/// }
///
/// impl ByteSized for Document {
///     fn has_references(&self) -> bool {
///         true
///     }
///
///     fn record(&self, probe: &mut SizeProbe) {
///         probe.add(std::mem::size_of::<Self>() as u64);
///         probe.element(&self.title);
///         probe.element(&self.lines);
///     }
/// }
/// ```
pub trait ByteSized {
    /// The value's in-place layout size, including any directly owned
    /// buffer the type considers part of itself (e.g. `String` counts its
    /// heap bytes here).
    fn shallow_size(&self) -> usize {
        mem::size_of_val(self)
    }

    /// Whether this value's layout can carry further references worth
    /// traversing. The `Adaptive` size mode only dives into children that
    /// return `true` here.
    fn has_references(&self) -> bool {
        false
    }

    /// Reports this value to the probe. The default reports the shallow
    /// size and nothing else; container types override this to also report
    /// children via [`SizeProbe::child`], [`SizeProbe::element`], or
    /// [`SizeProbe::elements`].
    fn record(&self, probe: &mut SizeProbe) {
        probe.add(self.shallow_size() as u64);
    }
}

/// Traversal state for one sizing pass.
///
/// Carries the depth budget, the collection sample budget, the running
/// total, and a visited-address set that makes traversal safe for cyclic
/// and shared (diamond-shaped) object graphs: every address is counted at
/// most once.
#[derive(Debug)]
pub struct SizeProbe {
    depth_limit: u32,
    sample_limit: usize,
    adaptive: bool,
    depth: u32,
    visited: HashSet<usize>,
    total: u64,
}

impl SizeProbe {
    fn new(mode: SizeMode) -> Self {
        let (depth_limit, sample_limit, adaptive) = match mode {
            SizeMode::Fast => (0, 0, false),
            SizeMode::Balanced => (2, 32, false),
            SizeMode::Accurate => (3, 64, false),
            SizeMode::Adaptive => (3, 64, true),
        };
        Self {
            depth_limit,
            sample_limit,
            adaptive,
            depth: 0,
            visited: HashSet::new(),
            total: 0,
        }
    }

    /// Adds raw bytes to the running total.
    pub fn add(&mut self, bytes: u64) {
        self.total = self.total.saturating_add(bytes);
    }

    /// Reports a child living in its own allocation (the pointee of a
    /// `Box`/`Arc`, for instance). Charges the child's full recorded size.
    ///
    /// Children beyond the depth budget are charged a fixed opaque cost;
    /// addresses already visited in this pass are charged nothing.
    pub fn child<V: ByteSized + ?Sized>(&mut self, value: &V) {
        if self.depth >= self.depth_limit {
            self.add(OPAQUE_CHILD_COST);
            return;
        }
        let addr = value as *const V as *const () as usize;
        if !self.visited.insert(addr) {
            return;
        }
        if self.adaptive && !value.has_references() {
            // Nothing behind this child; its in-place layout is all there is.
            self.add(value.shallow_size() as u64);
            return;
        }
        self.depth += 1;
        value.record(self);
        self.depth -= 1;
    }

    /// Reports a child stored *inline* in its parent (a field, an `Option`
    /// payload, a collection element). Charges only the heap the child owns
    /// beyond its in-place layout, which the parent already counted.
    pub fn element<V: ByteSized + ?Sized>(&mut self, value: &V) {
        let before = self.total;
        self.child(value);
        let full = self.total - before;
        self.total = before + full.saturating_sub(mem::size_of_val(value) as u64);
    }

    /// Reports a collection's elements with sampling: up to the mode's
    /// sample budget of elements are measured and the result is scaled
    /// linearly to the full length.
    ///
    /// In `Adaptive` mode, collections of reference-bearing elements are
    /// sampled at the cube root of their length, and collections of flat
    /// elements are skipped entirely (their buffer was already counted by
    /// the parent's shallow size).
    pub fn elements<'a, V, I>(&mut self, iter: I, len: usize, elements_have_references: bool)
    where
        V: ByteSized + 'a,
        I: Iterator<Item = &'a V>,
    {
        if len == 0 || self.depth >= self.depth_limit {
            return;
        }
        let cap = if self.adaptive {
            if !elements_have_references {
                return;
            }
            (len as f64).cbrt().ceil() as usize
        } else {
            self.sample_limit
        };
        let cap = cap.max(1);

        let before = self.total;
        let mut taken = 0u64;
        for value in iter.take(len.min(cap)) {
            self.element(value);
            taken += 1;
        }
        let sampled = self.total - before;
        if taken > 0 && (len as u64) > taken {
            self.add(sampled / taken * (len as u64 - taken));
        }
    }
}

/// Pluggable best-effort byte-size estimator for produced values.
///
/// The mode picks the accuracy/cost tradeoff; see [`SizeMode`]. For any
/// mode, estimates are deterministic for structurally identical inputs
/// within one process lifetime.
///
/// # Examples
///
/// ```
/// use rayo_core::{SizeMode, ValueSizer};
///
/// let sizer = ValueSizer::new(SizeMode::Balanced);
/// let value = vec!["alpha".to_string(), "beta".to_string()];
/// assert!(sizer.size_of(&value) > 0);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueSizer {
    mode: SizeMode,
}

impl ValueSizer {
    /// Creates a sizer with the given mode.
    pub fn new(mode: SizeMode) -> Self {
        Self { mode }
    }

    /// The configured mode.
    pub fn mode(&self) -> SizeMode {
        self.mode
    }

    /// Estimates the byte footprint of `value`. Total: never fails, never
    /// loops on cyclic graphs.
    pub fn size_of<T: ByteSized + ?Sized>(&self, value: &T) -> u64 {
        let mut probe = SizeProbe::new(self.mode);
        value.record(&mut probe);
        probe.total
    }
}

// Flat types: the in-place layout is the whole story.

impl ByteSized for i8 {}
impl ByteSized for i16 {}
impl ByteSized for i32 {}
impl ByteSized for i64 {}
impl ByteSized for i128 {}
impl ByteSized for isize {}

impl ByteSized for u8 {}
impl ByteSized for u16 {}
impl ByteSized for u32 {}
impl ByteSized for u64 {}
impl ByteSized for u128 {}
impl ByteSized for usize {}

impl ByteSized for f32 {}
impl ByteSized for f64 {}

impl ByteSized for bool {}
impl ByteSized for char {}

impl ByteSized for () {}

impl ByteSized for str {}

impl ByteSized for String {
    fn shallow_size(&self) -> usize {
        mem::size_of::<String>() + self.capacity()
    }

    fn has_references(&self) -> bool {
        true
    }
}

impl<T: ByteSized> ByteSized for Vec<T> {
    fn shallow_size(&self) -> usize {
        mem::size_of::<Self>() + self.capacity() * mem::size_of::<T>()
    }

    fn has_references(&self) -> bool {
        true
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(self.shallow_size() as u64);
        let elements_have_references = self.first().map_or(false, ByteSized::has_references);
        probe.elements(self.iter(), self.len(), elements_have_references);
    }
}

impl<T: ByteSized> ByteSized for Option<T> {
    fn has_references(&self) -> bool {
        self.as_ref().map_or(false, ByteSized::has_references)
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(mem::size_of::<Self>() as u64);
        if let Some(value) = self {
            probe.element(value);
        }
    }
}

impl<T: ByteSized, E: ByteSized> ByteSized for Result<T, E> {
    fn has_references(&self) -> bool {
        match self {
            Ok(value) => value.has_references(),
            Err(error) => error.has_references(),
        }
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(mem::size_of::<Self>() as u64);
        match self {
            Ok(value) => probe.element(value),
            Err(error) => probe.element(error),
        }
    }
}

impl<T1: ByteSized, T2: ByteSized> ByteSized for (T1, T2) {
    fn has_references(&self) -> bool {
        self.0.has_references() || self.1.has_references()
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(mem::size_of::<Self>() as u64);
        probe.element(&self.0);
        probe.element(&self.1);
    }
}

impl<T1: ByteSized, T2: ByteSized, T3: ByteSized> ByteSized for (T1, T2, T3) {
    fn has_references(&self) -> bool {
        self.0.has_references() || self.1.has_references() || self.2.has_references()
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(mem::size_of::<Self>() as u64);
        probe.element(&self.0);
        probe.element(&self.1);
        probe.element(&self.2);
    }
}

impl<T: ByteSized + ?Sized> ByteSized for Box<T> {
    fn has_references(&self) -> bool {
        true
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(mem::size_of::<Self>() as u64);
        probe.child(&**self);
    }
}

impl<T: ByteSized + ?Sized> ByteSized for Arc<T> {
    fn has_references(&self) -> bool {
        true
    }

    fn record(&self, probe: &mut SizeProbe) {
        probe.add(mem::size_of::<Self>() as u64);
        probe.child(&**self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_layout_sized() {
        let sizer = ValueSizer::new(SizeMode::Balanced);
        assert_eq!(sizer.size_of(&42i32), mem::size_of::<i32>() as u64);
        assert_eq!(sizer.size_of(&true), mem::size_of::<bool>() as u64);
        assert_eq!(sizer.size_of(&3.25f64), mem::size_of::<f64>() as u64);
    }

    #[test]
    fn test_string_counts_capacity() {
        let sizer = ValueSizer::new(SizeMode::Fast);
        let s = String::from("hello world");
        let expected = (mem::size_of::<String>() + s.capacity()) as u64;
        assert_eq!(sizer.size_of(&s), expected);
    }

    #[test]
    fn test_vec_of_primitives() {
        let sizer = ValueSizer::new(SizeMode::Balanced);
        let v = vec![1u64, 2, 3, 4];
        let expected = (mem::size_of::<Vec<u64>>() + v.capacity() * mem::size_of::<u64>()) as u64;
        assert_eq!(sizer.size_of(&v), expected);
    }

    #[test]
    fn test_vec_of_strings_counts_heap() {
        let sizer = ValueSizer::new(SizeMode::Balanced);
        let v = vec![String::from("aaaa"), String::from("bbbb")];
        let buffer = (mem::size_of::<Vec<String>>() + v.capacity() * mem::size_of::<String>()) as u64;
        let heap: u64 = v.iter().map(|s| s.capacity() as u64).sum();
        assert_eq!(sizer.size_of(&v), buffer + heap);
    }

    #[test]
    fn test_fast_mode_ignores_nested_heap() {
        let v = vec![String::from("a long enough string to matter"); 8];
        let fast = ValueSizer::new(SizeMode::Fast).size_of(&v);
        let balanced = ValueSizer::new(SizeMode::Balanced).size_of(&v);
        assert!(fast < balanced);
    }

    #[test]
    fn test_sampling_extrapolates() {
        // 100 identical strings, Balanced samples 32 and scales up.
        let v: Vec<String> = (0..100).map(|_| "x".repeat(50)).collect();
        let estimate = ValueSizer::new(SizeMode::Balanced).size_of(&v);
        let exact: u64 = (mem::size_of::<Vec<String>>()
            + v.capacity() * mem::size_of::<String>()) as u64
            + v.iter().map(|s| s.capacity() as u64).sum::<u64>();
        assert_eq!(estimate, exact);
    }

    #[test]
    fn test_shared_subgraph_counted_once() {
        let sizer = ValueSizer::new(SizeMode::Accurate);
        let shared = Arc::new("shared payload".repeat(10));
        let pair = (shared.clone(), shared.clone());
        let single = sizer.size_of(&shared);
        let both = sizer.size_of(&pair);
        // The second Arc adds only its own pointer, not the payload again.
        assert!(both < single * 2 + mem::size_of::<(Arc<String>, Arc<String>)>() as u64);
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        use parking_lot::Mutex;

        struct Node {
            payload: String,
            next: Mutex<Option<Arc<Node>>>,
        }

        impl ByteSized for Node {
            fn has_references(&self) -> bool {
                true
            }

            fn record(&self, probe: &mut SizeProbe) {
                probe.add(mem::size_of::<Self>() as u64);
                probe.element(&self.payload);
                if let Some(next) = &*self.next.lock() {
                    probe.child(&**next);
                }
            }
        }

        let a = Arc::new(Node {
            payload: "a".repeat(64),
            next: Mutex::new(None),
        });
        let b = Arc::new(Node {
            payload: "b".repeat(64),
            next: Mutex::new(Some(a.clone())),
        });
        *a.next.lock() = Some(b.clone());

        let size = ValueSizer::new(SizeMode::Accurate).size_of(&*a);
        assert!(size > 0);
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let sizer = ValueSizer::new(SizeMode::Adaptive);
        let make = || vec![vec![String::from("payload"); 10]; 10];
        assert_eq!(sizer.size_of(&make()), sizer.size_of(&make()));
    }

    #[test]
    fn test_adaptive_skips_flat_collections() {
        let v = vec![0u8; 4096];
        let adaptive = ValueSizer::new(SizeMode::Adaptive).size_of(&v);
        let balanced = ValueSizer::new(SizeMode::Balanced).size_of(&v);
        // Flat buffers are fully covered by the shallow size in both modes.
        assert_eq!(adaptive, balanced);
    }

    #[test]
    fn test_option_and_result() {
        let sizer = ValueSizer::new(SizeMode::Balanced);
        let some = Some(String::from("abcdef"));
        assert!(sizer.size_of(&some) >= (mem::size_of::<Option<String>>() + 6) as u64);

        let ok: Result<String, String> = Ok(String::from("abcdef"));
        assert!(sizer.size_of(&ok) >= (mem::size_of::<Result<String, String>>() + 6) as u64);
    }
}
