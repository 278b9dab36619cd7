//! Latest-value stream joins.
//!
//! [`with_latest`] pairs every item of a primary stream with the most recent value of
//! a snapshot stream. [`combine_latest`] emits a pair whenever either side changes,
//! once both have produced a value.
//!
//! When both inputs of [`with_latest`] are ready at once, the snapshot side is
//! polled first, so an item is evaluated against every snapshot already available.

use futures::stream::{self, BoxStream, PollNext, Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// What to do with primary items that arrive before the first snapshot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupGate {
    /// Discard them
    #[default]
    Drop,
    /// Hold them until the first snapshot arrives, then release in order
    Buffer,
}

enum Tagged<P, L> {
    Primary(P),
    PrimaryDone,
    Latest(L),
}

fn prefer_left(_: &mut ()) -> PollNext {
    PollNext::Left
}

/// Pair each primary item with the latest snapshot.
///
/// A new snapshot never replays earlier items. The output ends when the primary
/// stream ends (after any buffered items were released, if a snapshot still comes).
pub fn with_latest<P, L, SP, SL>(primary: SP, latest: SL, gate: StartupGate) -> BoxStream<'static, (P, L)>
where
    P: Send + 'static,
    L: Clone + Send + 'static,
    SP: Stream<Item = P> + Send + 'static,
    SL: Stream<Item = L> + Send + 'static,
{
    let primary = primary
        .map(Tagged::Primary)
        .chain(stream::once(async { Tagged::PrimaryDone }))
        .boxed();
    let latest = latest.map(Tagged::Latest).boxed();
    let mut merged = stream::select_with_strategy(latest, primary, prefer_left);

    Box::pin(async_stream::stream! {
        let mut current: Option<L> = None;
        let mut pending: Vec<P> = Vec::new();
        let mut primary_done = false;

        while let Some(item) = merged.next().await {
            match item {
                Tagged::Latest(value) => {
                    let first = current.is_none();
                    current = Some(value.clone());
                    if first && !pending.is_empty() {
                        tracing::debug!(count = pending.len(), "Releasing buffered items");
                        for held in pending.drain(..) {
                            yield (held, value.clone());
                        }
                    }
                    if primary_done {
                        break;
                    }
                },
                Tagged::Primary(item) => {
                    if let Some(value) = &current {
                        yield (item, value.clone());
                    } else {
                        match gate {
                            StartupGate::Drop => {
                                tracing::debug!("Dropping item that arrived before the first snapshot");
                            },
                            StartupGate::Buffer => pending.push(item),
                        }
                    }
                },
                Tagged::PrimaryDone => {
                    if pending.is_empty() {
                        break;
                    }
                    primary_done = true;
                },
            }
        }
    })
}

enum Either<A, B> {
    Left(A),
    Right(B),
}

/// Emit `(a, b)` on every change of either input once both have emitted.
pub fn combine_latest<A, B, SA, SB>(left: SA, right: SB) -> BoxStream<'static, (A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    SA: Stream<Item = A> + Send + 'static,
    SB: Stream<Item = B> + Send + 'static,
{
    let mut merged = stream::select(
        left.map(Either::Left).boxed(),
        right.map(Either::Right).boxed(),
    );

    Box::pin(async_stream::stream! {
        let mut a: Option<A> = None;
        let mut b: Option<B> = None;

        while let Some(item) = merged.next().await {
            match item {
                Either::Left(value) => a = Some(value),
                Either::Right(value) => b = Some(value),
            }
            if let (Some(a), Some(b)) = (&a, &b) {
                yield (a.clone(), b.clone());
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::channel::mpsc;

    #[tokio::test]
    async fn drop_gate_discards_early_items() {
        let (primary_tx, primary_rx) = mpsc::unbounded::<u32>();
        let (latest_tx, latest_rx) = mpsc::unbounded::<&str>();
        let mut joined = with_latest(primary_rx, latest_rx, StartupGate::Drop);

        primary_tx.unbounded_send(1).unwrap();
        assert!(joined.next().now_or_never().is_none());

        latest_tx.unbounded_send("c1").unwrap();
        primary_tx.unbounded_send(2).unwrap();
        drop(primary_tx);
        drop(latest_tx);

        let out: Vec<_> = joined.collect().await;
        assert_eq!(out, vec![(2, "c1")]);
    }

    #[tokio::test]
    async fn buffer_gate_releases_early_items() {
        let (primary_tx, primary_rx) = mpsc::unbounded::<u32>();
        let (latest_tx, latest_rx) = mpsc::unbounded::<&str>();
        let mut joined = with_latest(primary_rx, latest_rx, StartupGate::Buffer);

        primary_tx.unbounded_send(1).unwrap();
        assert!(joined.next().now_or_never().is_none());

        latest_tx.unbounded_send("c1").unwrap();
        primary_tx.unbounded_send(2).unwrap();
        drop(primary_tx);
        drop(latest_tx);

        let out: Vec<_> = joined.collect().await;
        assert_eq!(out, vec![(1, "c1"), (2, "c1")]);
    }

    #[tokio::test]
    async fn buffered_items_wait_for_late_snapshot() {
        let (latest_tx, latest_rx) = mpsc::unbounded::<&str>();
        let mut joined = with_latest(stream::iter([1, 2]), latest_rx, StartupGate::Buffer);
        assert!(joined.next().now_or_never().is_none());

        latest_tx.unbounded_send("c1").unwrap();
        let out: Vec<_> = joined.collect().await;
        assert_eq!(out, vec![(1, "c1"), (2, "c1")]);
    }

    #[tokio::test]
    async fn new_snapshot_does_not_replay() {
        let (primary_tx, primary_rx) = mpsc::unbounded::<u32>();
        let (latest_tx, latest_rx) = mpsc::unbounded::<&str>();
        let mut joined = with_latest(primary_rx, latest_rx, StartupGate::Drop);

        latest_tx.unbounded_send("c1").unwrap();
        primary_tx.unbounded_send(1).unwrap();
        assert_eq!(joined.next().await, Some((1, "c1")));

        latest_tx.unbounded_send("c2").unwrap();
        assert!(joined.next().now_or_never().is_none());

        primary_tx.unbounded_send(2).unwrap();
        assert_eq!(joined.next().await, Some((2, "c2")));
    }

    #[tokio::test]
    async fn ready_snapshot_wins_over_ready_item() {
        let joined = with_latest(stream::iter([1, 2]), stream::iter(["c1"]), StartupGate::Drop);
        let out: Vec<_> = joined.collect().await;
        assert_eq!(out, vec![(1, "c1"), (2, "c1")]);
    }

    #[tokio::test]
    async fn combine_latest_waits_for_both() {
        let (left_tx, left_rx) = mpsc::unbounded::<u32>();
        let (right_tx, right_rx) = mpsc::unbounded::<char>();
        let mut combined = combine_latest(left_rx, right_rx);

        left_tx.unbounded_send(1).unwrap();
        assert!(combined.next().now_or_never().is_none());

        right_tx.unbounded_send('a').unwrap();
        assert_eq!(combined.next().await, Some((1, 'a')));

        left_tx.unbounded_send(2).unwrap();
        assert_eq!(combined.next().await, Some((2, 'a')));
        drop(left_tx);
        drop(right_tx);
        assert_eq!(combined.next().await, None);
    }
}
