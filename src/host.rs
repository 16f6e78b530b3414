use std::collections::VecDeque;
use std::sync::Mutex;

/// Side effects the presentation layer asks of whatever is hosting it: a
/// browser shell, the terminal shell, or a test recorder.
pub trait UiHost: Send + Sync {
    /// Blocking notice to the user.
    fn alert(&self, message: &str);
    /// Yes/no question; `false` aborts the action.
    fn confirm(&self, message: &str) -> bool;
    /// Full navigation away from the current page.
    fn navigate(&self, href: &str);
    /// Rewrites the current URL without leaving the page.
    fn push_url(&self, path: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Alert(String),
    Confirm(String),
    Navigate(String),
    PushUrl(String),
}

/// Host that records every side effect and answers confirmations from a
/// queue (default: yes).
#[derive(Debug, Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    answers: Mutex<VecDeque<bool>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer for the next `confirm` call.
    pub fn answer_next(&self, answer: bool) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HostEvent::Navigate(href) => Some(href),
                _ => None,
            })
            .collect()
    }

    /// The URL as the user would see it: the last navigation or pushed path.
    pub fn current_url(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            HostEvent::Navigate(url) | HostEvent::PushUrl(url) => Some(url),
            _ => None,
        })
    }

    fn record(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl UiHost for RecordingHost {
    fn alert(&self, message: &str) {
        self.record(HostEvent::Alert(message.to_string()));
    }

    fn confirm(&self, message: &str) -> bool {
        self.record(HostEvent::Confirm(message.to_string()));
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(true)
    }

    fn navigate(&self, href: &str) {
        self.record(HostEvent::Navigate(href.to_string()));
    }

    fn push_url(&self, path: &str) {
        self.record(HostEvent::PushUrl(path.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_uses_queued_answers_then_defaults_to_yes() {
        let host = RecordingHost::new();
        host.answer_next(false);
        assert!(!host.confirm("first?"));
        assert!(host.confirm("second?"));
        assert_eq!(host.events().len(), 2);
    }

    #[test]
    fn current_url_tracks_latest_location_change() {
        let host = RecordingHost::new();
        assert_eq!(host.current_url(), None);
        host.push_url("/chat_1");
        host.alert("hello");
        assert_eq!(host.current_url().as_deref(), Some("/chat_1"));
        host.navigate("/auth");
        assert_eq!(host.current_url().as_deref(), Some("/auth"));
        assert_eq!(host.navigations(), vec!["/auth".to_string()]);
    }
}
