//! Bounded FIFO hand-off between the link and the consumers.
//!
//! Senders wait while the buffer is full and receivers wait while it is
//! empty. Closing wakes everyone: buffered messages stay receivable, new
//! sends are refused, and once drained every receive returns `None`.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use yardwatch_model::Message;

/// A bounded, ordered, closable multi-producer multi-consumer buffer.
#[derive(Debug)]
pub struct Channel {
    state: Mutex<ChannelState>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

#[derive(Debug)]
struct ChannelState {
    queue: VecDeque<Message>,
    closed: bool,
}

impl Channel {
    /// Creates an empty channel holding at most `capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        })
    }

    // Critical sections never panic, so a poisoned lock still holds a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a message, waiting while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] carrying the message back if the
    /// channel is or becomes closed before space frees up.
    pub async fn send(&self, message: Message) -> Result<()> {
        loop {
            // Register interest before checking state so a wake-up between
            // the check and the await is not missed.
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(Error::ChannelClosed(Box::new(message)));
                }
                if state.queue.len() < self.capacity {
                    state.queue.push_back(message);
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Removes the oldest message, waiting while the buffer is empty.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub async fn receive(&self) -> Option<Message> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(message) = state.queue.pop_front() {
                    drop(state);
                    self.not_full.notify_one();
                    return Some(message);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Removes the oldest message without waiting.
    pub fn try_receive(&self) -> Option<Message> {
        let message = self.lock().queue.pop_front();
        if message.is_some() {
            self.not_full.notify_one();
        }
        message
    }

    /// Closes the channel and wakes every blocked sender and receiver.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Returns true once [`Channel::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Maximum number of buffered messages.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, assert_ready_ok};
    use yardwatch_model::Coordinate;

    fn message(sequence: u64) -> Message {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        #[allow(clippy::cast_precision_loss)]
        let x = sequence as f64;
        Message::new(sequence, 1, ts, Coordinate::new(x, 0.0), 1)
    }

    #[test]
    fn zero_capacity_is_refused() {
        assert!(matches!(Channel::new(0), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn delivers_in_send_order() {
        let channel = Channel::new(8).unwrap();
        for i in 0..8 {
            channel.send(message(i)).await.unwrap();
        }
        assert_eq!(channel.len(), 8);
        for i in 0..8 {
            assert_eq!(channel.receive().await.unwrap().sequence, i);
        }
        assert!(channel.is_empty());
    }

    #[test]
    fn full_channel_applies_backpressure() {
        let channel = Channel::new(1).unwrap();
        assert_ready_ok!(tokio_test::task::spawn(channel.send(message(0))).poll());

        let mut blocked = tokio_test::task::spawn(channel.send(message(1)));
        assert_pending!(blocked.poll());

        assert_eq!(channel.try_receive().unwrap().sequence, 0);
        assert!(blocked.is_woken());
        assert_ready_ok!(blocked.poll());
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn close_wakes_blocked_receiver() {
        let channel = Channel::new(4).unwrap();
        let mut waiting = tokio_test::task::spawn(channel.receive());
        assert_pending!(waiting.poll());

        channel.close();
        assert!(waiting.is_woken());
        assert_ready_eq!(waiting.poll(), None);
    }

    #[test]
    fn close_hands_message_back_to_blocked_sender() {
        let channel = Channel::new(1).unwrap();
        assert_ready_ok!(tokio_test::task::spawn(channel.send(message(0))).poll());

        let mut blocked = tokio_test::task::spawn(channel.send(message(7)));
        assert_pending!(blocked.poll());
        channel.close();

        match assert_ready!(blocked.poll()) {
            Err(Error::ChannelClosed(returned)) => assert_eq!(returned.sequence, 7),
            other => panic!("expected ChannelClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buffered_messages_survive_close() {
        let channel = Channel::new(4).unwrap();
        channel.send(message(1)).await.unwrap();
        channel.send(message(2)).await.unwrap();
        channel.close();
        channel.close();

        assert!(channel.is_closed());
        assert!(channel.send(message(3)).await.is_err());
        assert_eq!(channel.receive().await.unwrap().sequence, 1);
        assert_eq!(channel.receive().await.unwrap().sequence, 2);
        assert!(channel.receive().await.is_none());
        assert!(channel.receive().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn messages_are_consumed_once() {
        let channel = Arc::new(Channel::new(4).unwrap());
        let total = 200;

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let channel = Arc::clone(&channel);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(message) = channel.receive().await {
                        seen.push(message.sequence);
                    }
                    seen
                })
            })
            .collect();

        for i in 0..total {
            channel.send(message(i)).await.unwrap();
        }
        channel.close();

        let mut all = HashSet::new();
        for consumer in consumers {
            for sequence in consumer.await.unwrap() {
                assert!(all.insert(sequence));
            }
        }
        assert_eq!(all.len(), usize::try_from(total).unwrap());
    }
}
