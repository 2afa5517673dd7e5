//! Utility types.

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Insertion-ordered map, so that every table iterates deterministically.
pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;

/// Insertion-ordered set.
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;
