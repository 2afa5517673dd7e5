//! Formatting helpers.

use std::fmt;

/// Wrap a closure as a `Display` implementation, for dumps that need extra
/// context to render.
pub fn fmt_with<F>(f: F) -> impl fmt::Display
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    struct FmtWith<F>(F);

    impl<F> fmt::Display for FmtWith<F>
    where
        F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            (self.0)(formatter)
        }
    }

    FmtWith(f)
}
