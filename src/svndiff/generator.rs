// Replace-window generation.
//
// No prior revision is available to diff against, so every window simply
// delivers a slice of the content through one CopyFromData instruction.
// Windows borrow their slice; nothing proportional to the whole input is
// allocated.

use std::iter::FusedIterator;

use super::window::DiffWindow;

/// Default cap on a single window's target length, in bytes.
pub const DEFAULT_WINDOW_SIZE: usize = 100_000;

/// Split `bytes` into replace windows of at most `max_window_size` bytes.
///
/// Empty input yields no windows.
///
/// # Panics
///
/// Panics if `max_window_size` is zero.
pub fn generate(bytes: &[u8], max_window_size: usize) -> ReplaceWindows<'_> {
    assert!(max_window_size > 0, "window size must be nonzero");
    ReplaceWindows {
        remaining: bytes,
        max_window_size,
    }
}

/// Build a single replace window over `bytes[offset..offset + count]`.
///
/// Returns `None` when `count` is zero: there is nothing to send, which is
/// not an error.
///
/// # Panics
///
/// Panics if the range is out of bounds for `bytes`.
pub fn create_replace_window(bytes: &[u8], offset: usize, count: usize) -> Option<DiffWindow<'_>> {
    if count == 0 {
        return None;
    }
    Some(DiffWindow::replace(&bytes[offset..offset + count]))
}

/// Lazy sequence of replace windows, see [`generate`].
#[derive(Debug, Clone)]
pub struct ReplaceWindows<'a> {
    remaining: &'a [u8],
    max_window_size: usize,
}

impl<'a> Iterator for ReplaceWindows<'a> {
    type Item = DiffWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let take = self.remaining.len().min(self.max_window_size);
        let (slice, rest) = self.remaining.split_at(take);
        self.remaining = rest;
        Some(DiffWindow::replace(slice))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.len().div_ceil(self.max_window_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ReplaceWindows<'_> {}
impl FusedIterator for ReplaceWindows<'_> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
