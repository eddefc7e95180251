use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::simulation::id::serializable_type::StableTypeId;
use crate::simulation::id::Id;

pub trait EndTime {
    fn end_time(&self, now: u32) -> u32;
}

pub trait Identifiable<I: StableTypeId> {
    fn id(&self) -> &Id<I>;
}

struct Entry<T: EndTime> {
    end_time: u32,
    order: u64,
    value: T,
}

impl<T: EndTime> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.end_time == other.end_time && self.order == other.order
    }
}

impl<T: EndTime> Eq for Entry<T> {}

impl<T: EndTime> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: EndTime> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed on both keys: BinaryHeap is a max-heap, we want the smallest end time
        // first and, at equal end times, insertion order (FIFO).
        other
            .end_time
            .cmp(&self.end_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// A queue of values that become due at a simulated point in time. Values with the same
/// due time leave in insertion order, which keeps wake-up processing deterministic.
pub struct TimeQueue<T: EndTime> {
    q: BinaryHeap<Entry<T>>,
    counter: u64,
}

impl<T: EndTime> Default for TimeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EndTime> TimeQueue<T> {
    pub fn new() -> Self {
        TimeQueue {
            q: BinaryHeap::new(),
            counter: 0,
        }
    }

    pub fn add(&mut self, value: T, now: u32) {
        let end_time = value.end_time(now);
        let order = self.counter;
        self.counter += 1;
        self.q.push(Entry {
            end_time,
            order,
            value,
        });
    }

    /// Removes and returns all values due at `now` or earlier, in (time, insertion) order.
    pub fn pop(&mut self, now: u32) -> Vec<T> {
        let mut result = Vec::new();
        while let Some(entry) = self.q.peek() {
            if entry.end_time <= now {
                result.push(self.q.pop().unwrap().value);
            } else {
                break;
            }
        }
        result
    }

    /// Removes everything still queued, regardless of due time. Used when a run hits its
    /// time limit and remaining agents are flushed as stuck.
    pub fn drain(&mut self) -> Vec<T> {
        let mut result = Vec::new();
        while let Some(entry) = self.q.pop() {
            result.push(entry.value);
        }
        result
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.q.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: u32,
        due: u32,
    }

    impl EndTime for Item {
        fn end_time(&self, _now: u32) -> u32 {
            self.due
        }
    }

    #[test]
    fn pop_respects_time() {
        let mut queue = TimeQueue::new();
        queue.add(Item { id: 1, due: 15 }, 0);
        queue.add(Item { id: 2, due: 10 }, 0);

        assert!(queue.pop(9).is_empty());

        let due = queue.pop(10);
        assert_eq!(1, due.len());
        assert_eq!(2, due[0].id);

        let due = queue.pop(20);
        assert_eq!(1, due.len());
        assert_eq!(1, due[0].id);
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let mut queue = TimeQueue::new();
        for id in 0..5 {
            queue.add(Item { id, due: 42 }, 0);
        }

        let due = queue.pop(42);
        let ids: Vec<_> = due.iter().map(|i| i.id).collect();
        assert_eq!(vec![0, 1, 2, 3, 4], ids);
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut queue = TimeQueue::new();
        queue.add(Item { id: 1, due: 100 }, 0);
        queue.add(Item { id: 2, due: 200 }, 0);

        assert_eq!(2, queue.drain().len());
        assert_eq!(0, queue.len());
    }
}
