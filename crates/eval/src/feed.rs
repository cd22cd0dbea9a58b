//! Input feeds: where the evaluator's cells come from.
//!
//! A feed is either an addressable array cursor or a forward-only
//! variadic cursor, plus a one-cell `pending` splice slot the `eval`
//! native uses to inject a computed value ahead of the source. The feed
//! owns the prefetched current cell: evaluation looks at `current`,
//! decides, then calls `advance`.
//!
//! Array feeds take the array's `RUNNING` read-lock for as long as the
//! feed lives, so nothing mutates an array mid-walk. Variadic feeds can
//! be *reified*: the unconsumed remainder drains into a fresh array, the
//! cursor is ended (exactly once — it is gone afterward), and the feed
//! continues as an array feed. An array reified after consumption began
//! carries the `TRUNCATED` flag.

use std::sync::Arc;
use tracing::trace;
use vessel_core::{Array, ArrayFlags, Cell, RunningGuard};

enum FeedSource {
    Array {
        array: Arc<Array>,
        /// Index of the next cell to read (one past `current` when
        /// `current` came from this array).
        next: usize,
    },
    Va {
        cursor: Option<Box<dyn Iterator<Item = Cell>>>,
        /// Cells pulled off the cursor and already replaced as `current`.
        consumed: usize,
    },
}

pub struct Feed {
    source: FeedSource,
    current: Option<Cell>,
    current_from_pending: bool,
    pending: Option<Cell>,
    /// Cached lookup of `current` (when it is a word), invalidated by
    /// every advance and by anything that writes a variable.
    pub(crate) gotten: Option<Cell>,
    lock: Option<RunningGuard>,
}

impl Feed {
    pub fn from_array(array: Arc<Array>, index: usize) -> Feed {
        let lock = RunningGuard::lock(&array);
        let mut feed = Feed {
            source: FeedSource::Array { array, next: index },
            current: None,
            current_from_pending: false,
            pending: None,
            gotten: None,
            lock: Some(lock),
        };
        feed.advance();
        feed
    }

    pub fn from_va(
        first: Option<Cell>,
        rest: impl Iterator<Item = Cell> + 'static,
    ) -> Feed {
        let mut feed = Feed {
            source: FeedSource::Va {
                cursor: Some(Box::new(rest)),
                consumed: 0,
            },
            current: None,
            current_from_pending: false,
            pending: None,
            gotten: None,
            lock: None,
        };
        match first {
            Some(cell) if !cell.is_end() => feed.current = Some(cell),
            _ => feed.advance(),
        }
        feed
    }

    /// An exhausted feed, for frames that consume no input.
    pub fn empty() -> Feed {
        Feed::from_array(Array::new(), 0)
    }

    pub fn is_va(&self) -> bool {
        matches!(self.source, FeedSource::Va { .. })
    }

    /// The prefetched current cell; `None` is end of input.
    pub fn current(&self) -> Option<&Cell> {
        self.current.as_ref()
    }

    /// Inject a computed cell to be consumed before the source resumes.
    pub fn splice(&mut self, cell: Cell) {
        assert!(self.pending.is_none(), "a splice is already pending");
        self.pending = Some(cell);
    }

    /// Replace `current` with the next cell: the pending splice if one is
    /// set, otherwise the next source cell. An end-marked cell in the
    /// stream terminates the feed.
    pub fn advance(&mut self) {
        self.gotten = None;
        if self.current.is_some() && !self.current_from_pending {
            if let FeedSource::Va { consumed, .. } = &mut self.source {
                *consumed += 1;
            }
        }
        if let Some(spliced) = self.pending.take() {
            self.current = Some(spliced);
            self.current_from_pending = true;
            return;
        }
        self.current_from_pending = false;
        self.current = match &mut self.source {
            FeedSource::Array { array, next } => match array.get(*next) {
                Some(cell) if !cell.is_end() => {
                    *next += 1;
                    Some(cell)
                }
                _ => None,
            },
            FeedSource::Va { cursor, consumed: _ } => match cursor.as_mut().and_then(Iterator::next)
            {
                Some(cell) if !cell.is_end() => Some(cell),
                _ => {
                    // End the platform cursor exactly once.
                    *cursor = None;
                    None
                }
            },
        };
    }

    /// For array feeds: the index evaluation would resume from.
    pub fn resume_index(&self) -> usize {
        match &self.source {
            FeedSource::Array { next, .. } => {
                if self.current.is_some() && !self.current_from_pending {
                    next - 1
                } else {
                    *next
                }
            }
            FeedSource::Va { .. } => 0,
        }
    }

    /// Drain a variadic feed into a fresh array and continue from it.
    /// Idempotent on array feeds: returns the array already walked.
    pub fn reify(&mut self) -> Arc<Array> {
        match &mut self.source {
            FeedSource::Array { array, .. } => array.clone(),
            FeedSource::Va { cursor, consumed } => {
                let mut cells = Vec::new();
                if let Some(current) = self.current.take() {
                    cells.push(current);
                }
                if let Some(pending) = self.pending.take() {
                    cells.push(pending);
                }
                if let Some(iter) = cursor.take() {
                    for cell in iter {
                        if cell.is_end() {
                            break;
                        }
                        cells.push(cell);
                    }
                }
                trace!(cells = cells.len(), consumed = *consumed, "variadic feed reified");
                let array = Array::from_cells(cells);
                if *consumed > 0 {
                    array.set_flag(ArrayFlags::TRUNCATED);
                }
                self.lock = Some(RunningGuard::lock(&array));
                self.source = FeedSource::Array {
                    array: array.clone(),
                    next: 0,
                };
                self.current_from_pending = false;
                self.gotten = None;
                self.advance();
                array
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_feed_prefetch_and_advance() {
        let array = Array::from_cells(vec![Cell::integer(1), Cell::integer(2)]);
        let mut feed = Feed::from_array(array.clone(), 0);
        assert!(array.get_flag(ArrayFlags::RUNNING), "feed takes the read-lock");
        assert_eq!(feed.current(), Some(&Cell::integer(1)));
        assert_eq!(feed.resume_index(), 0);
        feed.advance();
        assert_eq!(feed.current(), Some(&Cell::integer(2)));
        assert_eq!(feed.resume_index(), 1);
        feed.advance();
        assert_eq!(feed.current(), None);
        assert_eq!(feed.resume_index(), 2);
        drop(feed);
        assert!(!array.get_flag(ArrayFlags::RUNNING), "drop releases the lock");
    }

    #[test]
    fn test_splice_overrides_source_once() {
        let array = Array::from_cells(vec![Cell::integer(1), Cell::integer(2)]);
        let mut feed = Feed::from_array(array, 0);
        feed.splice(Cell::integer(99));
        feed.advance();
        assert_eq!(feed.current(), Some(&Cell::integer(99)));
        feed.advance();
        assert_eq!(feed.current(), Some(&Cell::integer(2)));
    }

    #[test]
    fn test_va_feed_is_forward_only() {
        let mut feed = Feed::from_va(
            Some(Cell::integer(1)),
            vec![Cell::integer(2)].into_iter(),
        );
        assert!(feed.is_va());
        assert_eq!(feed.current(), Some(&Cell::integer(1)));
        feed.advance();
        assert_eq!(feed.current(), Some(&Cell::integer(2)));
        feed.advance();
        assert_eq!(feed.current(), None);
    }

    #[test]
    fn test_va_feed_stops_at_end_cell() {
        let mut feed = Feed::from_va(
            None,
            vec![Cell::integer(1), Cell::end(), Cell::integer(2)].into_iter(),
        );
        assert_eq!(feed.current(), Some(&Cell::integer(1)));
        feed.advance();
        assert_eq!(feed.current(), None, "end cell terminates the cursor");
        feed.advance();
        assert_eq!(feed.current(), None);
    }

    #[test]
    fn test_reify_untouched_feed_is_not_truncated() {
        let mut feed = Feed::from_va(
            Some(Cell::integer(1)),
            vec![Cell::word("x")].into_iter(),
        );
        let array = feed.reify();
        assert!(!feed.is_va());
        assert!(!array.get_flag(ArrayFlags::TRUNCATED));
        assert_eq!(array.len(), 2);
        assert_eq!(feed.current(), Some(&Cell::integer(1)));
    }

    #[test]
    fn test_reify_after_consumption_marks_truncation() {
        let mut feed = Feed::from_va(
            Some(Cell::integer(1)),
            vec![Cell::integer(2), Cell::integer(3)].into_iter(),
        );
        feed.advance();
        let array = feed.reify();
        assert!(array.get_flag(ArrayFlags::TRUNCATED));
        assert_eq!(array.len(), 2);
        assert_eq!(feed.current(), Some(&Cell::integer(2)));
    }
}
