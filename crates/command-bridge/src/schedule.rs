use crate::CommandPlan;
use rfx_transport::Transmission;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One transmission that is due now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Due {
    pub label: String,
    pub transmission: Transmission,
    pub attempt: u32,
    pub of: u32,
}

/// Deadline queue for repeated transmissions.
///
/// Plans run one at a time in arrival order so repeat sequences never
/// interleave on the radio, and consecutive transmissions are at least
/// `interval` apart. Callers wait for `next_deadline` instead of sleeping.
#[derive(Debug)]
pub struct RepeatQueue {
    interval: Duration,
    active: Option<(CommandPlan, u32)>,
    waiting: VecDeque<CommandPlan>,
    next_slot: Option<Instant>,
}

impl RepeatQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
            waiting: VecDeque::new(),
            next_slot: None,
        }
    }

    pub fn push(&mut self, plan: CommandPlan) {
        self.waiting.push_back(plan);
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.waiting.is_empty()
    }

    pub fn pending(&self) -> usize {
        let active = self
            .active
            .as_ref()
            .map(|(plan, sent)| plan.repeat_count.saturating_sub(*sent))
            .unwrap_or(0);
        active as usize + self.waiting.iter().map(|p| p.repeat_count as usize).sum::<usize>()
    }

    /// When the next transmission may go out, if any is queued.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_empty() {
            None
        } else {
            // Nothing sent yet means it may go immediately
            Some(self.next_slot.unwrap_or_else(Instant::now))
        }
    }

    pub fn pop_due(&mut self, now: Instant) -> Option<Due> {
        if self.next_slot.is_some_and(|slot| now < slot) {
            return None;
        }
        if self.active.is_none() {
            self.active = self.waiting.pop_front().map(|plan| (plan, 0));
        }
        let (plan, sent) = self.active.as_mut()?;
        *sent += 1;
        let due = Due {
            label: plan.label.clone(),
            transmission: plan.transmission.clone(),
            attempt: *sent,
            of: plan.repeat_count,
        };
        if *sent >= plan.repeat_count {
            self.active = None;
        }
        self.next_slot = Some(now + self.interval);
        Some(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(label: &str, repeat_count: u32) -> CommandPlan {
        CommandPlan {
            label: label.into(),
            transmission: Transmission::Chime1 {
                sub_type: 0,
                id: 1,
                sound: 1,
            },
            repeat_count,
        }
    }

    #[test]
    fn test_spacing_between_repetitions() {
        let t0 = Instant::now();
        let mut q = RepeatQueue::new(Duration::from_millis(100));
        q.push(plan("a", 2));
        assert_eq!(q.pop_due(t0).map(|d| d.attempt), Some(1));
        assert!(q.pop_due(t0 + Duration::from_millis(50)).is_none());
        assert_eq!(q.next_deadline(), Some(t0 + Duration::from_millis(100)));
        let second = q.pop_due(t0 + Duration::from_millis(100)).unwrap();
        assert_eq!((second.attempt, second.of), (2, 2));
        assert!(q.is_empty());
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn test_plans_do_not_interleave() {
        let t0 = Instant::now();
        let mut q = RepeatQueue::new(Duration::ZERO);
        q.push(plan("a", 2));
        q.push(plan("b", 2));
        assert_eq!(q.pending(), 4);
        let order: Vec<String> = std::iter::from_fn(|| q.pop_due(t0))
            .map(|d| format!("{}{}", d.label, d.attempt))
            .collect();
        assert_eq!(order, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_next_plan_waits_for_interval() {
        let t0 = Instant::now();
        let mut q = RepeatQueue::new(Duration::from_millis(100));
        q.push(plan("a", 1));
        assert!(q.pop_due(t0).is_some());
        q.push(plan("b", 1));
        assert!(q.pop_due(t0 + Duration::from_millis(10)).is_none());
        assert!(q.pop_due(t0 + Duration::from_millis(100)).is_some());
    }
}
