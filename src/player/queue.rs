use crate::types::Track;

/// Ordered track list with a movable cursor.
///
/// The cursor is `None` until a queued track is played, and is cleared
/// again whenever a URL outside the list is played directly.
#[derive(Default)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    cursor: Option<usize>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the track list. The cursor resets; the first subsequent
    /// `next` starts from the top of the new list.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.cursor = None;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Option<usize>) {
        self.cursor = cursor;
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.tracks.get(i))
    }

    /// Index of the first track with this URL, if any.
    pub fn position_of(&self, url: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.url == url)
    }

    /// Advances the cursor, wrapping past the end back to the first track.
    /// A cleared cursor also starts from the first track.
    pub fn next(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let next = match self.cursor {
            Some(i) if i + 1 < self.tracks.len() => i + 1,
            _ => 0,
        };
        self.cursor = Some(next);
        self.tracks.get(next)
    }

    /// Steps the cursor back, wrapping before the first track to the last.
    /// A cleared cursor starts from the last track.
    pub fn previous(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let prev = match self.cursor {
            Some(i) if i > 0 => i - 1,
            _ => self.tracks.len() - 1,
        };
        self.cursor = Some(prev);
        self.tracks.get(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64, url: &str) -> Track {
        Track {
            id,
            owner_id: 0,
            artist: String::new(),
            title: format!("track {id}"),
            duration: "01:00".to_string(),
            url: url.to_string(),
        }
    }

    fn queue_of(urls: &[&str]) -> TrackQueue {
        let mut queue = TrackQueue::new();
        queue.set_tracks(
            urls.iter()
                .enumerate()
                .map(|(i, url)| track(i as u64, url))
                .collect(),
        );
        queue
    }

    #[test]
    fn next_wraps_at_the_end() {
        let mut queue = queue_of(&["http://h/a.mp3", "http://h/b.mp3", "http://h/c.mp3"]);

        assert_eq!(queue.next().map(|t| t.id), Some(0));
        assert_eq!(queue.next().map(|t| t.id), Some(1));
        assert_eq!(queue.next().map(|t| t.id), Some(2));
        assert_eq!(queue.next().map(|t| t.id), Some(0));
    }

    #[test]
    fn previous_wraps_at_the_start() {
        let mut queue = queue_of(&["http://h/a.mp3", "http://h/b.mp3", "http://h/c.mp3"]);

        assert_eq!(queue.previous().map(|t| t.id), Some(2));
        assert_eq!(queue.previous().map(|t| t.id), Some(1));
        assert_eq!(queue.previous().map(|t| t.id), Some(0));
        assert_eq!(queue.previous().map(|t| t.id), Some(2));
    }

    #[test]
    fn empty_queue_never_yields() {
        let mut queue = TrackQueue::new();
        assert!(queue.next().is_none());
        assert!(queue.previous().is_none());
        assert!(queue.current().is_none());
    }

    #[test]
    fn position_of_matches_urls_only_in_the_list() {
        let queue = queue_of(&["http://h/a.mp3", "http://h/b.mp3"]);
        assert_eq!(queue.position_of("http://h/b.mp3"), Some(1));
        assert_eq!(queue.position_of("http://h/z.mp3"), None);
    }

    #[test]
    fn replacing_tracks_clears_the_cursor() {
        let mut queue = queue_of(&["http://h/a.mp3"]);
        queue.next();
        assert_eq!(queue.cursor(), Some(0));

        queue.set_tracks(vec![track(9, "http://h/z.mp3")]);
        assert_eq!(queue.cursor(), None);
        assert_eq!(queue.next().map(|t| t.id), Some(9));
    }
}
