//! Lazy grouping of edge records into fixed-size batches.

use taxograph_core::{Batch, Edge};

use crate::error::{ImportError, Result};

/// Iterator adaptor yielding [`Batch`]es of at most `size` edges, in input order.
///
/// The final partial batch is yielded once. A record error is passed through
/// and ends the sequence.
pub struct Batches<I> {
    records: I,
    size: usize,
    seq: u64,
    done: bool,
}

/// Wrap a record source. `size` must be positive.
pub fn produce_batches<I, E>(records: I, size: usize) -> Result<Batches<I::IntoIter>>
where
    I: IntoIterator<Item = std::result::Result<Edge, E>>,
{
    if size == 0 {
        return Err(ImportError::Config("batch size must be positive".to_string()));
    }
    Ok(Batches {
        records: records.into_iter(),
        size,
        seq: 0,
        done: false,
    })
}

impl<I, E> Iterator for Batches<I>
where
    I: Iterator<Item = std::result::Result<Edge, E>>,
{
    type Item = std::result::Result<Batch, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut edges = Vec::with_capacity(self.size.min(4096));
        while edges.len() < self.size {
            match self.records.next() {
                Some(Ok(edge)) => edges.push(edge),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if edges.is_empty() {
            return None;
        }
        let batch = Batch::new(self.seq, edges);
        self.seq += 1;
        Some(Ok(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxograph_core::EntityName;

    fn edges(n: usize) -> Vec<std::result::Result<Edge, ImportError>> {
        (0..n)
            .map(|i| {
                Ok(Edge::new(
                    EntityName::new(format!("p{i}")).unwrap(),
                    EntityName::new(format!("c{i}")).unwrap(),
                ))
            })
            .collect()
    }

    #[test]
    fn test_batch_counts_and_sizes() {
        for n in 0..=25usize {
            for b in 1..=7usize {
                let batches: Vec<Batch> = produce_batches(edges(n), b)
                    .unwrap()
                    .map(|r| r.unwrap())
                    .collect();

                assert_eq!(batches.len(), n.div_ceil(b), "n={n} b={b}");
                assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), n);
                if let Some(last) = batches.last() {
                    let expected = if n % b == 0 { b } else { n % b };
                    assert_eq!(last.len(), expected, "n={n} b={b}");
                }
            }
        }
    }

    #[test]
    fn test_order_and_sequence_numbers() {
        let batches: Vec<Batch> = produce_batches(edges(5), 2)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let seqs: Vec<u64> = batches.iter().map(Batch::seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(batches[1].edges()[0].parent.as_str(), "p2");
        assert_eq!(batches[2].edges()[0].child.as_str(), "c4");
    }

    #[test]
    fn test_record_error_ends_sequence() {
        let mut records = edges(3);
        records.insert(1, Err(ImportError::Config("bad row".into())));
        records.extend(edges(2));

        let mut batches = produce_batches(records, 10).unwrap();
        assert!(matches!(batches.next(), Some(Err(ImportError::Config(_)))));
        assert!(batches.next().is_none());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(
            produce_batches(edges(1), 0),
            Err(ImportError::Config(_))
        ));
    }
}
