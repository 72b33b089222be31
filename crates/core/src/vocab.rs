//! Closed-vocabulary lookup.
//!
//! Status codes, file operations, file modes, chat states and message kinds
//! are all small fixed tables of strings. Each table is an enum implementing
//! [`Vocabulary`], and every lookup goes through [`index_of`].

/// Position of `value` in an ordered vocabulary, or `None` if absent.
///
/// Matching is exact and case-sensitive.
pub fn index_of<'a, I>(set: I, value: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    set.into_iter().position(|candidate| candidate == value)
}

/// A fixed, ordered set of wire names backed by an enum.
pub trait Vocabulary: Copy + 'static {
    /// Every variant, in wire-table order.
    const ALL: &'static [Self];

    /// Canonical wire name of this variant.
    fn as_str(&self) -> &'static str;

    /// Resolve a wire name to its variant.
    fn resolve(value: &str) -> Option<Self> {
        index_of(Self::ALL.iter().map(|v| v.as_str()), value).map(|index| Self::ALL[index])
    }

    /// Position of this variant in the table.
    fn index(&self) -> usize {
        index_of(Self::ALL.iter().map(|v| v.as_str()), self.as_str()).unwrap_or(0)
    }
}
