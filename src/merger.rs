//! Binary heap merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of chunks (inputs).
///
/// The heap only holds the ordering key (the item and the index of its source). Sources are kept aside and
/// dropped as soon as they are exhausted, which releases whatever resources they hold.
pub struct BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: Iterator<Item = Result<T, E>>,
{
    // binary heap is max-heap by default so we reverse it to convert it to min-heap,
    // equal items are ordered by source index
    items: BinaryHeap<Reverse<(T, usize)>>,
    chunks: Vec<Option<C>>,
    initiated: bool,

    /// Source error type.
    error_type: PhantomData<E>,
}

impl<T, E, C> BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: Iterator<Item = Result<T, E>>,
{
    /// Creates an instance of a binary heap merger using chunks as inputs.
    /// Chunk items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to be merged in a single sorted one
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIterator<IntoIter = C, Item = Result<T, E>>,
    {
        let chunks = Vec::from_iter(chunks.into_iter().map(|c| Some(c.into_iter())));
        let items = BinaryHeap::with_capacity(chunks.len());

        return BinaryHeapMerger {
            chunks,
            items,
            initiated: false,
            error_type: PhantomData,
        };
    }

    /// Returns the number of sources that are not exhausted yet.
    pub fn active_sources(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    fn advance(&mut self, idx: usize) -> Result<(), E> {
        let next = match self.chunks[idx].as_mut() {
            Some(chunk) => chunk.next(),
            None => None,
        };

        match next {
            Some(Ok(item)) => self.items.push(Reverse((item, idx))),
            Some(Err(err)) => return Err(err),
            None => self.chunks[idx] = None,
        }

        return Ok(());
    }
}

impl<T, E, C> Iterator for BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            self.initiated = true;
            for idx in 0..self.chunks.len() {
                if let Err(err) = self.advance(idx) {
                    return Some(Err(err));
                }
            }
        }

        let Reverse((result, idx)) = self.items.pop()?;
        if let Err(err) = self.advance(idx) {
            return Some(Err(err));
        }

        return Some(Ok(result));
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use std::cell::Cell;
    use std::error::Error;
    use std::io::{self, ErrorKind};
    use std::rc::Rc;

    use super::BinaryHeapMerger;

    #[rstest]
    #[case(
        vec![],
        vec![],
    )]
    #[case(
        vec![
            vec![],
            vec![]
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![Ok(4), Ok(5), Ok(7)],
            vec![Ok(1), Ok(6)],
            vec![Ok(3)],
            vec![],
        ],
        vec![Ok(1), Ok(3), Ok(4), Ok(5), Ok(6), Ok(7)],
    )]
    #[case(
        vec![
            vec![Ok(2), Ok(2)],
            vec![Ok(1), Ok(2)],
        ],
        vec![Ok(1), Ok(2), Ok(2), Ok(2)],
    )]
    #[case(
        vec![
            vec![Result::Err(io::Error::new(ErrorKind::Other, "test error"))]
        ],
        vec![
            Result::Err(io::Error::new(ErrorKind::Other, "test error"))
        ],
    )]
    #[case(
        vec![
            vec![Ok(3), Result::Err(io::Error::new(ErrorKind::Other, "test error"))],
            vec![Ok(1), Ok(2)],
        ],
        vec![
            Ok(1),
            Ok(2),
            Result::Err(io::Error::new(ErrorKind::Other, "test error")),
        ],
    )]
    fn test_merger(
        #[case] chunks: Vec<Vec<Result<i32, io::Error>>>,
        #[case] expected_result: Vec<Result<i32, io::Error>>,
    ) {
        let merger = BinaryHeapMerger::new(chunks);
        let actual_result = merger.collect();
        assert!(
            compare_vectors_of_result::<_, io::Error>(&actual_result, &expected_result),
            "actual={:?}, expected={:?}",
            actual_result,
            expected_result
        );
    }

    /// Item ordered by key only, the tag identifies the source it came from.
    #[derive(Debug)]
    struct Keyed(&'static str, usize);

    impl PartialEq for Keyed {
        fn eq(&self, other: &Self) -> bool {
            self.0 == other.0
        }
    }

    impl Eq for Keyed {}

    impl PartialOrd for Keyed {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for Keyed {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.0.cmp(other.0)
        }
    }

    #[test]
    fn test_equal_items_follow_source_order() {
        let chunks: Vec<Vec<Result<Keyed, io::Error>>> = vec![
            vec![Ok(Keyed("b", 0))],
            vec![Ok(Keyed("a", 1)), Ok(Keyed("b", 1))],
            vec![Ok(Keyed("b", 2))],
        ];
        let merger = BinaryHeapMerger::new(chunks);
        let actual: Vec<(&str, usize)> = merger.map(|item| item.map(|k| (k.0, k.1)).unwrap()).collect();

        assert_eq!(actual, vec![("a", 1), ("b", 0), ("b", 1), ("b", 2)]);
    }

    struct Tracked {
        items: std::vec::IntoIter<Result<i32, io::Error>>,
        released: Rc<Cell<usize>>,
    }

    impl Iterator for Tracked {
        type Item = Result<i32, io::Error>;

        fn next(&mut self) -> Option<Self::Item> {
            self.items.next()
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    #[test]
    fn test_exhausted_sources_released() {
        let released = Rc::new(Cell::new(0));
        let tracked = |items: Vec<i32>| Tracked {
            items: Vec::from_iter(items.into_iter().map(Ok)).into_iter(),
            released: released.clone(),
        };

        let mut merger = BinaryHeapMerger::new(vec![tracked(vec![1, 5]), tracked(vec![2]), tracked(vec![])]);

        assert_eq!(merger.next().unwrap().unwrap(), 1);
        // the empty source is released while seeding the heap
        assert_eq!(released.get(), 1);
        assert_eq!(merger.next().unwrap().unwrap(), 2);
        assert_eq!(released.get(), 2);
        assert_eq!(merger.active_sources(), 1);
        assert_eq!(merger.next().unwrap().unwrap(), 5);
        assert_eq!(released.get(), 3);
        assert!(merger.next().is_none());
    }

    fn compare_vectors_of_result<T: PartialEq, E: Error + 'static>(
        actual: &Vec<Result<T, E>>,
        expected: &Vec<Result<T, E>>,
    ) -> bool {
        actual.len() == expected.len()
            && actual
                .into_iter()
                .zip(expected)
                .all(
                    |(actual_result, expected_result)| match (actual_result, expected_result) {
                        (Ok(actual_result), Ok(expected_result)) if actual_result == expected_result => true,
                        (Err(actual_err), Err(expected_err)) => actual_err.to_string() == expected_err.to_string(),
                        _ => false,
                    },
                )
    }
}
