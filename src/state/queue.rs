use std::collections::VecDeque;

use crate::state::karaoke::HistoryEntry;

/// Number of played songs kept in the history.
pub const HISTORY_CAPACITY: usize = 100;

/// Result of trying to append a code to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePush {
    /// The code was appended to the tail.
    Queued,
    /// The code was empty and ignored.
    Empty,
    /// The code equals the current tail and was ignored.
    DuplicateTail,
}

/// FIFO of song codes waiting to be played.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeQueue {
    codes: VecDeque<String>,
}

impl CodeQueue {
    /// Rebuild a queue from persisted codes, keeping their order.
    pub fn from_codes(codes: impl IntoIterator<Item = String>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    /// Append `code` unless it is empty or equals the current tail.
    ///
    /// Only the tail is compared: a code may appear several times in the queue
    /// as long as the occurrences are not adjacent.
    pub fn push(&mut self, code: &str) -> QueuePush {
        if code.is_empty() {
            return QueuePush::Empty;
        }
        if self.codes.back().is_some_and(|tail| tail == code) {
            return QueuePush::DuplicateTail;
        }
        self.codes.push_back(code.to_owned());
        QueuePush::Queued
    }

    /// Remove the first occurrence of `code`, returning whether one was found.
    pub fn remove(&mut self, code: &str) -> bool {
        match self.codes.iter().position(|queued| queued == code) {
            Some(index) => {
                self.codes.remove(index);
                true
            }
            None => false,
        }
    }

    /// Pop the head of the queue.
    pub fn shift(&mut self) -> Option<String> {
        self.codes.pop_front()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Owned copy of the queued codes in playback order.
    pub fn to_vec(&self) -> Vec<String> {
        self.codes.iter().cloned().collect()
    }
}

/// Bounded log of played songs, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueHistory {
    entries: VecDeque<HistoryEntry>,
}

impl QueueHistory {
    /// Rebuild the history from persisted entries, keeping only the most recent ones.
    pub fn from_entries(entries: impl IntoIterator<Item = HistoryEntry>) -> Self {
        let mut history = Self::default();
        for entry in entries {
            history.push(entry);
        }
        history
    }

    /// Append an entry, evicting the oldest one beyond [`HISTORY_CAPACITY`].
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Pop the code played before `current_code`.
    ///
    /// The entry for the song currently playing is dropped first so that the
    /// returned code is the one before it.
    pub fn pop_previous(&mut self, current_code: Option<&str>) -> Option<String> {
        if let Some(current) = current_code
            && self.entries.back().is_some_and(|last| last.code == current)
        {
            self.entries.pop_back();
        }
        self.entries.pop_back().map(|entry| entry.code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of the entries, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::karaoke::Song;

    fn entry(code: &str) -> HistoryEntry {
        HistoryEntry {
            code: code.into(),
            song: Song {
                id: code.into(),
                title: format!("Title {code}"),
                artist: "Artist".into(),
                path: format!("/songs/{code}.mp4"),
            },
            timestamp: 0,
        }
    }

    #[test]
    fn consecutive_duplicate_is_suppressed() {
        let mut queue = CodeQueue::default();
        assert_eq!(queue.push("000001"), QueuePush::Queued);
        assert_eq!(queue.push("000001"), QueuePush::DuplicateTail);
        assert_eq!(queue.to_vec(), vec!["000001"]);
    }

    #[test]
    fn non_adjacent_duplicate_is_allowed() {
        let mut queue = CodeQueue::default();
        queue.push("000001");
        queue.push("000002");
        assert_eq!(queue.push("000001"), QueuePush::Queued);
        assert_eq!(queue.to_vec(), vec!["000001", "000002", "000001"]);
    }

    #[test]
    fn empty_code_is_ignored() {
        let mut queue = CodeQueue::default();
        assert_eq!(queue.push(""), QueuePush::Empty);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_drops_first_occurrence_only() {
        let mut queue = CodeQueue::from_codes(["1", "2", "1"].map(String::from));
        assert!(queue.remove("1"));
        assert_eq!(queue.to_vec(), vec!["2", "1"]);
        assert!(!queue.remove("9"));
    }

    #[test]
    fn shift_pops_in_fifo_order() {
        let mut queue = CodeQueue::default();
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.shift().as_deref(), Some("a"));
        assert_eq!(queue.shift().as_deref(), Some("b"));
        assert_eq!(queue.shift(), None);
    }

    #[test]
    fn history_keeps_most_recent_entries() {
        let mut history = QueueHistory::default();
        for i in 0..150 {
            history.push(entry(&format!("{i:06}")));
        }
        let entries = history.to_vec();
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries.first().unwrap().code, "000050");
        assert_eq!(entries.last().unwrap().code, "000149");
    }

    #[test]
    fn previous_skips_the_song_currently_playing() {
        let mut history = QueueHistory::from_entries([entry("1"), entry("2"), entry("3")]);
        assert_eq!(history.pop_previous(Some("3")).as_deref(), Some("2"));
        assert_eq!(history.to_vec().len(), 1);
        assert_eq!(history.pop_previous(None).as_deref(), Some("1"));
        assert_eq!(history.pop_previous(None), None);
    }
}
