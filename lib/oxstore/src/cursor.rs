//! Pull-based, explicitly closeable iteration.
//!
//! A [`Cursor`] closes itself when it is exhausted or when it returns an error.
//! Wrapping cursors forward [`Cursor::close`] to the cursors they wrap and
//! a closed cursor only returns `Ok(None)`.

use std::marker::PhantomData;

/// A lazy sequence of fallible results that can be released early.
pub trait Cursor {
    type Item;
    type Error;

    /// Returns the next element, `Ok(None)` once exhausted or closed.
    fn next(&mut self) -> Result<Option<Self::Item>, Self::Error>;

    /// Releases the resources held by the cursor. Idempotent.
    fn close(&mut self);

    /// Keeps only the elements matching `predicate`.
    fn filter<F: FnMut(&Self::Item) -> bool>(self, predicate: F) -> FilterCursor<Self, F>
    where
        Self: Sized,
    {
        FilterCursor {
            inner: self,
            predicate,
        }
    }

    /// Maps each element. `None` drops the element.
    fn filter_map<T, F: FnMut(Self::Item) -> Option<T>>(self, f: F) -> MapCursor<Self, F>
    where
        Self: Sized,
    {
        MapCursor { inner: self, f }
    }

    /// Skips `offset` elements and returns at most `limit` of the following ones.
    ///
    /// The wrapped cursor is closed as soon as the limit is reached.
    fn slice(self, offset: usize, limit: Option<usize>) -> SliceCursor<Self>
    where
        Self: Sized,
    {
        SliceCursor {
            inner: self,
            to_skip: offset,
            remaining: limit,
        }
    }

    /// Adapts the cursor into an [`Iterator`]. The cursor is closed when the iterator is dropped.
    fn into_results(self) -> CursorIter<Self>
    where
        Self: Sized,
    {
        CursorIter { inner: self }
    }
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    type Item = C::Item;
    type Error = C::Error;

    #[inline]
    fn next(&mut self) -> Result<Option<C::Item>, C::Error> {
        (**self).next()
    }

    #[inline]
    fn close(&mut self) {
        (**self).close()
    }
}

/// A cursor over an iterator of results.
pub struct IterCursor<I> {
    inner: Option<I>,
}

impl<I> IterCursor<I> {
    #[inline]
    pub fn new(inner: I) -> Self {
        Self { inner: Some(inner) }
    }
}

impl<T, E, I: Iterator<Item = Result<T, E>>> Cursor for IterCursor<I> {
    type Item = T;
    type Error = E;

    fn next(&mut self) -> Result<Option<T>, E> {
        let Some(inner) = &mut self.inner else {
            return Ok(None);
        };
        match inner.next() {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(e)) => {
                self.close();
                Err(e)
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    #[inline]
    fn close(&mut self) {
        self.inner = None;
    }
}

/// A cursor without any element.
pub struct EmptyCursor<T, E> {
    _types: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Default for EmptyCursor<T, E> {
    fn default() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<T, E> Cursor for EmptyCursor<T, E> {
    type Item = T;
    type Error = E;

    #[inline]
    fn next(&mut self) -> Result<Option<T>, E> {
        Ok(None)
    }

    #[inline]
    fn close(&mut self) {}
}

/// See [`Cursor::filter`].
pub struct FilterCursor<C, F> {
    inner: C,
    predicate: F,
}

impl<C: Cursor, F: FnMut(&C::Item) -> bool> Cursor for FilterCursor<C, F> {
    type Item = C::Item;
    type Error = C::Error;

    fn next(&mut self) -> Result<Option<C::Item>, C::Error> {
        while let Some(item) = self.inner.next()? {
            if (self.predicate)(&item) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    #[inline]
    fn close(&mut self) {
        self.inner.close()
    }
}

/// See [`Cursor::filter_map`].
pub struct MapCursor<C, F> {
    inner: C,
    f: F,
}

impl<T, C: Cursor, F: FnMut(C::Item) -> Option<T>> Cursor for MapCursor<C, F> {
    type Item = T;
    type Error = C::Error;

    fn next(&mut self) -> Result<Option<T>, C::Error> {
        while let Some(item) = self.inner.next()? {
            if let Some(item) = (self.f)(item) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    #[inline]
    fn close(&mut self) {
        self.inner.close()
    }
}

/// See [`Cursor::slice`].
pub struct SliceCursor<C> {
    inner: C,
    to_skip: usize,
    remaining: Option<usize>,
}

impl<C: Cursor> Cursor for SliceCursor<C> {
    type Item = C::Item;
    type Error = C::Error;

    fn next(&mut self) -> Result<Option<C::Item>, C::Error> {
        if self.remaining == Some(0) {
            self.inner.close();
            return Ok(None);
        }
        while self.to_skip > 0 {
            if self.inner.next()?.is_none() {
                return Ok(None);
            }
            self.to_skip -= 1;
        }
        let Some(item) = self.inner.next()? else {
            return Ok(None);
        };
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
            if *remaining == 0 {
                self.inner.close();
            }
        }
        Ok(Some(item))
    }

    fn close(&mut self) {
        self.remaining = Some(0);
        self.inner.close()
    }
}

/// An [`Iterator`] over the results of a [`Cursor`], see [`Cursor::into_results`].
///
/// The cursor is closed when the iterator is dropped.
pub struct CursorIter<C: Cursor> {
    inner: C,
}

impl<C: Cursor> Iterator for CursorIter<C> {
    type Item = Result<C::Item, C::Error>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().transpose()
    }
}

impl<C: Cursor> Drop for CursorIter<C> {
    fn drop(&mut self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts the pulled elements and records whether it has been closed.
    struct Counter {
        next: usize,
        end: usize,
        pulled: Rc<Cell<usize>>,
        closed: Rc<Cell<bool>>,
    }

    impl Cursor for Counter {
        type Item = usize;
        type Error = String;

        fn next(&mut self) -> Result<Option<usize>, String> {
            if self.closed.get() || self.next >= self.end {
                self.close();
                return Ok(None);
            }
            self.pulled.set(self.pulled.get() + 1);
            self.next += 1;
            Ok(Some(self.next))
        }

        fn close(&mut self) {
            self.closed.set(true)
        }
    }

    fn counter(end: usize) -> (Counter, Rc<Cell<usize>>, Rc<Cell<bool>>) {
        let pulled = Rc::new(Cell::new(0));
        let closed = Rc::new(Cell::new(false));
        (
            Counter {
                next: 0,
                end,
                pulled: Rc::clone(&pulled),
                closed: Rc::clone(&closed),
            },
            pulled,
            closed,
        )
    }

    #[test]
    fn slice_closes_after_limit() {
        let (cursor, pulled, closed) = counter(10);
        let mut slice = cursor.slice(2, Some(3));
        assert_eq!(slice.next(), Ok(Some(3)));
        assert_eq!(slice.next(), Ok(Some(4)));
        assert!(!closed.get());
        assert_eq!(slice.next(), Ok(Some(5)));
        assert!(closed.get());
        assert_eq!(pulled.get(), 5);
        assert_eq!(slice.next(), Ok(None));
        assert_eq!(pulled.get(), 5);
    }

    #[test]
    fn exhaustion_closes() {
        let mut cursor = IterCursor::new(vec![Ok::<_, ()>(1)].into_iter());
        assert_eq!(cursor.next(), Ok(Some(1)));
        assert_eq!(cursor.next(), Ok(None));
        assert!(cursor.inner.is_none());
    }

    #[test]
    fn errors_close() {
        let mut cursor = IterCursor::new(vec![Err("boom"), Ok(1)].into_iter());
        assert_eq!(cursor.next(), Err("boom"));
        assert_eq!(cursor.next(), Ok(None));
    }

    #[test]
    fn empty_slice_closes() {
        let (cursor, pulled, closed) = counter(10);
        let mut slice = cursor.slice(0, Some(0));
        assert_eq!(slice.next(), Ok(None));
        assert!(closed.get());
        assert_eq!(pulled.get(), 0);
    }

    #[test]
    fn close_propagates() {
        let (cursor, _, closed) = counter(3);
        let mut cursor = cursor.filter(|i| i % 2 == 1).filter_map(|i| Some(i * 10));
        assert_eq!(cursor.next(), Ok(Some(10)));
        cursor.close();
        cursor.close();
        assert!(closed.get());
        assert_eq!(cursor.next(), Ok(None));
    }

    #[test]
    fn filter_then_iterate() {
        let (cursor, _, closed) = counter(5);
        let items = cursor
            .filter(|i| i % 2 == 0)
            .into_results()
            .collect::<Result<Vec<_>, _>>();
        assert_eq!(items, Ok(vec![2, 4]));
        assert!(closed.get());
    }

    #[test]
    fn dropping_iterator_closes() {
        let (cursor, _, closed) = counter(5);
        let mut iter = cursor.into_results();
        assert_eq!(iter.next(), Some(Ok(1)));
        drop(iter);
        assert!(closed.get());
    }

    #[test]
    fn empty() {
        let mut cursor = EmptyCursor::<u8, ()>::default();
        assert_eq!(cursor.next(), Ok(None));
    }
}
