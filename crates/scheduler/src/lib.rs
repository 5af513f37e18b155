//! Single-slot frame request queue.
//!
//! Interactive callers may ask for a redraw many times between two display
//! refreshes; only the most recent request survives until the refresh takes it.
//! The queue is payload-agnostic so the renderer can store whole effect chains
//! while tests use plain integers.
use std::time::Instant;

/// Monotonically increasing identifier handed out for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub ticket: Ticket,
    /// Ticket of the pending request this one displaced, if any.
    pub replaced: Option<Ticket>,
}

/// A request that is due for execution.
#[derive(Debug, Clone)]
pub struct ScheduledFrame<T> {
    pub ticket: Ticket,
    pub payload: T,
    pub requested_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub requested: u64,
    pub coalesced: u64,
    pub cancelled: u64,
    pub executed: u64,
}

#[derive(Debug)]
pub struct FrameScheduler<T> {
    pending: Option<ScheduledFrame<T>>,
    next_ticket: u64,
    stats: SchedulerStats,
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameScheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            next_ticket: 1,
            stats: SchedulerStats::default(),
        }
    }

    /// Stores `payload` as the only pending frame, displacing any request that
    /// has not been taken yet.
    pub fn request(&mut self, payload: T, now: Instant) -> RequestOutcome {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.stats.requested += 1;

        let replaced = self.pending.take().map(|previous| previous.ticket);
        if let Some(previous) = replaced {
            self.stats.coalesced += 1;
            tracing::trace!(previous = previous.0, ticket = ticket.0, "coalesced frame request");
        } else {
            tracing::trace!(ticket = ticket.0, "scheduled frame request");
        }

        self.pending = Some(ScheduledFrame {
            ticket,
            payload,
            requested_at: now,
        });
        RequestOutcome { ticket, replaced }
    }

    /// Drops the pending request. A cancelled request is never returned by
    /// [`FrameScheduler::take_due`].
    pub fn cancel(&mut self) -> Option<T> {
        let frame = self.pending.take()?;
        self.stats.cancelled += 1;
        tracing::trace!(ticket = frame.ticket.0, "cancelled frame request");
        Some(frame.payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hands the pending request to the caller at refresh time. The slot is
    /// empty afterwards, so every request executes at most once.
    pub fn take_due(&mut self) -> Option<ScheduledFrame<T>> {
        let frame = self.pending.take()?;
        self.stats.executed += 1;
        tracing::trace!(ticket = frame.ticket.0, "frame request due");
        Some(frame)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
