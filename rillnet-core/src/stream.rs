//! Bounded sample FIFOs joining pipeline stages.
//!
//! Every edge of the dataflow graph is a bounded channel of [`Fixed`]
//! samples. A producer blocks on a full edge and a consumer blocks on an
//! empty one, which is the only synchronization the graph needs. A severed
//! edge means a peer stage died mid-pass; partial output is meaningless, so
//! both ends treat that as fatal rather than recoverable.

use crossbeam_channel::{bounded, Receiver, Sender};
use rillnet_utils::Fixed;

/// Create one bounded stream edge holding at most `capacity` samples.
pub fn fifo(capacity: usize) -> (SampleSender, SampleReceiver) {
    let (tx, rx) = bounded(capacity);
    (SampleSender(tx), SampleReceiver(rx))
}

/// Producing end of a stream edge.
pub struct SampleSender(Sender<Fixed>);

impl SampleSender {
    /// Emit one sample, blocking while the edge is full.
    #[inline]
    pub fn push(&self, sample: Fixed) {
        self.0
            .send(sample)
            .expect("stream severed: consumer stage terminated early");
    }
}

/// Consuming end of a stream edge.
pub struct SampleReceiver(Receiver<Fixed>);

impl SampleReceiver {
    /// Take one sample, blocking while the edge is empty.
    #[inline]
    pub fn pull(&mut self) -> Fixed {
        self.0
            .recv()
            .expect("stream severed: producer stage terminated early")
    }

    /// Drain every remaining sample until all producers hang up.
    pub fn into_vec(self) -> Vec<Fixed> {
        self.0.iter().collect()
    }
}

/// Blocking pull interface shared by channel edges and in-memory sources.
pub trait SampleSource {
    /// The next sample in stream order.
    fn next_sample(&mut self) -> Fixed;
}

impl SampleSource for SampleReceiver {
    #[inline]
    fn next_sample(&mut self) -> Fixed {
        self.pull()
    }
}

/// Deterministic in-memory source for unit tests and benches.
pub struct IterSource<I>(pub I);

impl<I: Iterator<Item = Fixed>> SampleSource for IterSource<I> {
    #[inline]
    fn next_sample(&mut self) -> Fixed {
        self.0.next().expect("sample source underrun")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_preserves_order() {
        let (tx, rx) = fifo(8);
        for i in 0..8 {
            tx.push(Fixed::from_int(i));
        }
        drop(tx);
        let drained = rx.into_vec();
        assert_eq!(drained.len(), 8);
        for (i, v) in drained.iter().enumerate() {
            assert_eq!(*v, Fixed::from_int(i as i32));
        }
    }

    #[test]
    fn iter_source_yields_in_order() {
        let data = vec![Fixed::ONE, Fixed::ZERO, Fixed::from_int(2)];
        let mut source = IterSource(data.clone().into_iter());
        for expected in data {
            assert_eq!(source.next_sample(), expected);
        }
    }
}
