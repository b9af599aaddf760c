use std::collections::{HashMap, VecDeque};

use super::msg::{ChatMessage, Participant};

/// Live state of one room: who is connected, and the last few messages.
#[derive(Debug)]
pub(crate) struct Room {
    pub(crate) participants: HashMap<String, Participant>,
    recent: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Room {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            participants: HashMap::new(),
            recent: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Keeps at most `capacity` messages, dropping the oldest first.
    pub(crate) fn remember(&mut self, message: ChatMessage) {
        if self.capacity == 0 {
            return;
        }
        while self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(message);
    }

    pub(crate) fn recent(&self) -> impl Iterator<Item = &ChatMessage> {
        self.recent.iter()
    }

    /// Closes every connection still open in this room.
    pub(crate) fn close_all(&self) {
        for participant in self.participants.values() {
            if participant.connection.is_open() {
                participant.connection.close();
            }
        }
    }
}
