use crate::api::{StatusSnapshot, TaskEntry};

/// Result of one poll round trip. `None` for a section means the fetch
/// failed; the panel shows fixed fallback text in that case.
#[derive(Debug)]
pub struct PollUpdate {
    pub status: Option<StatusSnapshot>,
    pub queue: Option<Vec<TaskEntry>>,
    pub history: Option<Vec<TaskEntry>>,
}

/// State behind the status/queue/history pane. Each applied poll replaces
/// the displayed state wholesale; a monotonic sequence number guards
/// against a slow response overwriting newer data.
pub struct StatusPanel {
    pub status: Option<StatusSnapshot>,
    pub queue: Vec<TaskEntry>,
    pub history: Vec<TaskEntry>,
    pub status_failed: bool,
    pub queue_failed: bool,
    pub history_failed: bool,
    pub paused: bool,
    next_seq: u64,
    applied_seq: u64,
}

impl StatusPanel {
    pub fn new() -> Self {
        Self {
            status: None,
            queue: Vec::new(),
            history: Vec::new(),
            status_failed: false,
            queue_failed: false,
            history_failed: false,
            paused: false,
            next_seq: 0,
            applied_seq: 0,
        }
    }

    /// Reserve a sequence number for the next poll, or `None` while paused.
    pub fn begin_poll(&mut self) -> Option<u64> {
        if self.paused {
            return None;
        }
        self.next_seq += 1;
        Some(self.next_seq)
    }

    /// Apply a completed poll. Returns false (and changes nothing) when a
    /// newer poll has already been applied.
    pub fn apply(&mut self, seq: u64, update: PollUpdate) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        match update.status {
            Some(status) => {
                self.status = Some(status);
                self.status_failed = false;
            }
            None => self.status_failed = true,
        }
        match update.queue {
            Some(queue) => {
                self.queue = queue;
                self.queue_failed = false;
            }
            None => self.queue_failed = true,
        }
        match update.history {
            Some(history) => {
                self.history = history;
                self.history_failed = false;
            }
            None => self.history_failed = true,
        }
        true
    }

    /// Pause suspends issuing new polls; it touches no backend state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn mode(&self) -> &str {
        self.status.as_ref().map(|s| s.mode.as_str()).unwrap_or("ajax")
    }

    pub fn set_mode(&mut self, mode: String) {
        match &mut self.status {
            Some(status) => status.mode = mode,
            None => {
                self.status = Some(StatusSnapshot {
                    mode,
                    current_task: String::new(),
                    live_status: "idle".to_string(),
                    history: Vec::new(),
                });
            }
        }
    }

    /// Running while the queue has work, otherwise idle.
    pub fn running(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn next_task(&self) -> Option<&TaskEntry> {
        self.queue.first()
    }

    pub fn last_task(&self) -> Option<&TaskEntry> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(tasks: &[&str]) -> Vec<TaskEntry> {
        tasks
            .iter()
            .map(|task| {
                serde_json::from_str(&format!(
                    r#"{{"timestamp": "06:30", "task": "{}"}}"#,
                    task
                ))
                .unwrap()
            })
            .collect()
    }

    fn update(queue: &[&str], history: &[&str]) -> PollUpdate {
        PollUpdate {
            status: None,
            queue: Some(entries(queue)),
            history: Some(entries(history)),
        }
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut panel = StatusPanel::new();
        let first = panel.begin_poll().unwrap();
        let second = panel.begin_poll().unwrap();

        assert!(panel.apply(second, update(&["newer"], &[])));
        // The slow first response arrives afterwards and must not win.
        assert!(!panel.apply(first, update(&["older"], &[])));
        assert_eq!(panel.queue[0].task, "newer");
    }

    #[test]
    fn pause_suspends_polling() {
        let mut panel = StatusPanel::new();
        panel.toggle_pause();
        assert!(panel.begin_poll().is_none());
        panel.toggle_pause();
        assert!(panel.begin_poll().is_some());
    }

    #[test]
    fn running_follows_the_queue() {
        let mut panel = StatusPanel::new();
        assert!(!panel.running());
        let seq = panel.begin_poll().unwrap();
        panel.apply(seq, update(&["post reel"], &["comment round"]));
        assert!(panel.running());
        assert_eq!(panel.next_task().unwrap().task, "post reel");
        assert_eq!(panel.last_task().unwrap().task, "comment round");
    }

    #[test]
    fn failed_fetch_keeps_previous_data_and_flags_it() {
        let mut panel = StatusPanel::new();
        let seq = panel.begin_poll().unwrap();
        panel.apply(seq, update(&["post reel"], &[]));

        let seq = panel.begin_poll().unwrap();
        panel.apply(
            seq,
            PollUpdate {
                status: None,
                queue: None,
                history: None,
            },
        );
        assert!(panel.queue_failed);
        assert_eq!(panel.queue[0].task, "post reel");
    }

    #[test]
    fn failed_status_fetch_is_flagged_and_keeps_previous_snapshot() {
        let mut panel = StatusPanel::new();
        let seq = panel.begin_poll().unwrap();
        let snapshot: StatusSnapshot = serde_json::from_str(r#"{"mode": "logan"}"#).unwrap();
        panel.apply(
            seq,
            PollUpdate {
                status: Some(snapshot),
                queue: Some(Vec::new()),
                history: Some(Vec::new()),
            },
        );
        assert!(!panel.status_failed);

        let seq = panel.begin_poll().unwrap();
        panel.apply(
            seq,
            PollUpdate {
                status: None,
                queue: Some(Vec::new()),
                history: Some(Vec::new()),
            },
        );
        assert!(panel.status_failed);
        assert_eq!(panel.mode(), "logan");

        // A later successful fetch clears the flag.
        let seq = panel.begin_poll().unwrap();
        let snapshot: StatusSnapshot = serde_json::from_str(r#"{"mode": "ajax"}"#).unwrap();
        panel.apply(
            seq,
            PollUpdate {
                status: Some(snapshot),
                queue: Some(Vec::new()),
                history: Some(Vec::new()),
            },
        );
        assert!(!panel.status_failed);
    }

    #[test]
    fn mode_falls_back_to_ajax() {
        let mut panel = StatusPanel::new();
        assert_eq!(panel.mode(), "ajax");
        panel.set_mode("logan".to_string());
        assert_eq!(panel.mode(), "logan");
    }
}
