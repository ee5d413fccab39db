//! Depth-indexed request queue
//!
//! Buckets are indexed by depth. Higher buckets drain completely before lower
//! ones, and each bucket is LIFO, so the most recently discovered deepest job
//! runs next (roughly depth-first crawl order). There is no fairness across
//! depths: a steady stream of deep submissions starves shallow ones.

/// An array of LIFO buckets indexed by depth
#[derive(Debug)]
pub struct RequestQueue<T> {
    buckets: Vec<Vec<T>>,
    len: usize,
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            len: 0,
        }
    }

    /// Pushes onto the bucket at `depth`, creating it and any missing lower buckets
    pub fn push(&mut self, depth: usize, item: T) {
        if self.buckets.len() <= depth {
            self.buckets.resize_with(depth + 1, Vec::new);
        }
        self.buckets[depth].push(item);
        self.len += 1;
    }

    /// Pushes onto the lowest-priority bucket (depth 0)
    pub fn push_lowest(&mut self, item: T) {
        self.push(0, item);
    }

    /// Pushes onto the highest bucket currently present (depth 0 if none exist)
    pub fn push_highest(&mut self, item: T) {
        let depth = self.buckets.len().saturating_sub(1);
        self.push(depth, item);
    }

    /// Removes the most recently pushed item of the highest non-empty bucket
    pub fn pop_highest(&mut self) -> Option<T> {
        let item = self
            .buckets
            .iter_mut()
            .rev()
            .find(|bucket| !bucket.is_empty())
            .and_then(Vec::pop)?;
        self.len -= 1;
        Some(item)
    }

    /// Number of queued items across all buckets
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets created so far (empty ones included)
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of items waiting at `depth`
    pub fn depth_len(&self, depth: usize) -> usize {
        self.buckets.get(depth).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let mut queue: RequestQueue<u32> = RequestQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.bucket_count(), 0);
        assert_eq!(queue.pop_highest(), None);
    }

    #[test]
    fn test_push_creates_intermediate_buckets() {
        let mut queue = RequestQueue::new();
        queue.push(3, "deep");

        assert_eq!(queue.bucket_count(), 4);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.depth_len(3), 1);
        assert_eq!(queue.depth_len(1), 0);
    }

    #[test]
    fn test_pop_highest_bucket_first() {
        let mut queue = RequestQueue::new();
        queue.push(0, "shallow");
        queue.push(2, "deep");
        queue.push(1, "middle");

        assert_eq!(queue.pop_highest(), Some("deep"));
        assert_eq!(queue.pop_highest(), Some("middle"));
        assert_eq!(queue.pop_highest(), Some("shallow"));
        assert_eq!(queue.pop_highest(), None);
    }

    #[test]
    fn test_bucket_is_lifo() {
        let mut queue = RequestQueue::new();
        for i in 0..5 {
            queue.push(0, i);
        }

        let order: Vec<i32> = std::iter::from_fn(|| queue.pop_highest()).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_buckets_survive_draining() {
        let mut queue = RequestQueue::new();
        queue.push(2, 'a');
        queue.pop_highest();

        assert!(queue.is_empty());
        assert_eq!(queue.bucket_count(), 3);

        queue.push_highest('b');
        assert_eq!(queue.depth_len(2), 1);
    }

    #[test]
    fn test_push_lowest_and_highest() {
        let mut queue = RequestQueue::new();
        queue.push_highest('x');
        assert_eq!(queue.depth_len(0), 1);

        queue.push(4, 'y');
        queue.push_lowest('z');
        queue.push_highest('w');

        assert_eq!(queue.depth_len(0), 2);
        assert_eq!(queue.depth_len(4), 2);
        assert_eq!(queue.pop_highest(), Some('w'));
        assert_eq!(queue.pop_highest(), Some('y'));
        assert_eq!(queue.pop_highest(), Some('z'));
        assert_eq!(queue.pop_highest(), Some('x'));
    }
}
