use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin over a fixed set of API keys.
pub struct Rotator {
    keys: Vec<String>,
    next: AtomicUsize,
}

impl Rotator {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn next(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed);
        Some(self.keys[idx % self.keys.len()].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_keys() {
        let rotator = Rotator::new(vec!["a".to_string(), "b".to_string()]);
        let seen: Vec<String> = (0..3).filter_map(|_| rotator.next()).collect();
        assert_eq!(seen, vec!["a", "b", "a"]);
        assert!(Rotator::new(Vec::new()).next().is_none());
    }
}
