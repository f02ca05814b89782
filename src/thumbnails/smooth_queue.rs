use std::collections::{HashSet, VecDeque};

use crate::models::Url;

/// FIFO of urls awaiting a smooth rescale. Each url appears at most once.
#[derive(Debug, Default)]
pub struct SmoothQueue {
    order: VecDeque<Url>,
    members: HashSet<Url>,
}

impl SmoothQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `url` unless it is already queued. Returns true if it was added.
    pub fn push(&mut self, url: Url) -> bool {
        if !self.members.insert(url.clone()) {
            return false;
        }
        self.order.push_back(url);
        true
    }

    pub fn pop(&mut self) -> Option<Url> {
        let url = self.order.pop_front()?;
        self.members.remove(&url);
        Some(url)
    }

    pub fn remove(&mut self, url: &Url) -> bool {
        if !self.members.remove(url) {
            return false;
        }
        self.order.retain(|queued| queued != url);
        true
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.members.contains(url)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
