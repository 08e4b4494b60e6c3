use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::PendingTurn;

/// One-shot delayed commits for page turns. Entries are never cancelled:
/// every scheduled turn is handed back once its deadline passes.
#[derive(Debug)]
pub struct TurnScheduler {
    delay: Duration,
    queue: VecDeque<(Instant, PendingTurn)>,
}

impl TurnScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            queue: VecDeque::new(),
        }
    }

    pub fn schedule(&mut self, now: Instant, turn: PendingTurn) -> Instant {
        let due = now + self.delay;
        self.queue.push_back((due, turn));
        due
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops the earliest turn whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingTurn> {
        match self.queue.front() {
            Some((due, _)) if *due <= now => self.queue.pop_front().map(|(_, turn)| turn),
            _ => None,
        }
    }

    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.queue
            .front()
            .map(|(due, _)| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_is_released_only_after_the_delay() {
        let start = Instant::now();
        let mut scheduler = TurnScheduler::new(Duration::from_millis(600));
        scheduler.schedule(start, PendingTurn { target: 2 });

        assert_eq!(scheduler.take_due(start), None);
        assert_eq!(
            scheduler.take_due(start + Duration::from_millis(599)),
            None
        );
        assert_eq!(
            scheduler.time_until_next(start + Duration::from_millis(100)),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            scheduler.take_due(start + Duration::from_millis(600)),
            Some(PendingTurn { target: 2 })
        );
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.time_until_next(start), None);
    }

    #[test]
    fn turns_are_released_in_schedule_order() {
        let start = Instant::now();
        let mut scheduler = TurnScheduler::new(Duration::from_millis(10));
        scheduler.schedule(start, PendingTurn { target: 2 });
        scheduler.schedule(start + Duration::from_millis(5), PendingTurn { target: 4 });

        let late = start + Duration::from_secs(1);
        assert_eq!(scheduler.take_due(late), Some(PendingTurn { target: 2 }));
        assert_eq!(scheduler.take_due(late), Some(PendingTurn { target: 4 }));
        assert_eq!(scheduler.take_due(late), None);
    }
}
