//! Session registry and per-session state.
//!
//! ## Thread Safety:
//! The registry is a `RwLock<HashMap>` (create/lookup/delete need only
//! lightweight synchronization); each session's state sits behind its own
//! `RwLock` inside an `Arc<SessionHandle>`. The handle additionally carries
//! two async mutexes: `work` serializes whole-chunk processing per session
//! (preserving timeline contiguity), `render` admits at most one render in
//! flight per session. Both are tokio mutexes because they are held across
//! await points.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("maximum concurrent sessions ({0}) reached")]
    CapacityReached(usize),
}

/// Persisted record of one successfully processed chunk.
///
/// Immutable once appended. For consecutively created segments,
/// `start_ms` equals the previous segment's `end_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub translated_text: String,
    pub audio_path: PathBuf,
}

/// One live dubbing session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub chunk_count: u64,
    /// Cumulative duration consumed by prior successfully transcribed
    /// chunks, in milliseconds.
    pub timeline_cursor_ms: u64,
    pub segments: Vec<Segment>,
    pub video_path: Option<PathBuf>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            chunk_count: 0,
            timeline_cursor_ms: 0,
            segments: Vec::new(),
            video_path: None,
        }
    }
}

/// Shared handle to one session's state and its serialization locks.
pub struct SessionHandle {
    id: String,
    state: RwLock<Session>,
    /// Held for the full duration of one chunk's pipeline run.
    pub work: tokio::sync::Mutex<()>,
    /// Held for the full duration of one render.
    pub render: tokio::sync::Mutex<()>,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        Self {
            state: RwLock::new(Session::new(id.clone())),
            id,
            work: tokio::sync::Mutex::new(()),
            render: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consistent copy of the session state at this instant.
    pub fn snapshot(&self) -> Session {
        self.state.read().unwrap().clone()
    }

    fn with_mut<R>(&self, mutate: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.state.write().unwrap();
        mutate(&mut session)
    }
}

/// Registry of live sessions; the only owner of session state.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Register a new session and return its id.
    pub fn create(&self) -> Result<String, SessionError> {
        let mut sessions = self.sessions.write().unwrap();
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::CapacityReached(self.max_sessions));
        }

        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), Arc::new(SessionHandle::new(id.clone())));
        info!(sid = %id, "Session created");
        Ok(id)
    }

    /// Look up a live session's handle.
    pub fn handle(&self, id: &str) -> Result<Arc<SessionHandle>, SessionError> {
        let sessions = self.sessions.read().unwrap();
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Snapshot a session's current state.
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        Ok(self.handle(id)?.snapshot())
    }

    /// Remove all state for a session. Subsequent operations on the id fail
    /// with `NotFound`.
    pub fn delete(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.remove(id) {
            Some(_) => {
                info!(sid = %id, "Session deleted");
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Append a processed segment to the session's history.
    pub fn append_segment(&self, id: &str, segment: Segment) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        handle.with_mut(|session| session.segments.push(segment));
        Ok(())
    }

    /// Atomically allocate the next timeline span: reads the cursor as the
    /// span start, advances it by `delta_ms`, and returns
    /// `(start_ms, end_ms)`.
    pub fn advance_cursor(&self, id: &str, delta_ms: u64) -> Result<(u64, u64), SessionError> {
        let handle = self.handle(id)?;
        Ok(handle.with_mut(|session| {
            let start_ms = session.timeline_cursor_ms;
            let end_ms = start_ms + delta_ms;
            session.timeline_cursor_ms = end_ms;
            (start_ms, end_ms)
        }))
    }

    /// Attach the uploaded source video to the session.
    pub fn set_video_path(&self, id: &str, path: PathBuf) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        handle.with_mut(|session| session.video_path = Some(path));
        Ok(())
    }

    /// Bump the processed-chunk counter (also on empty-transcript chunks).
    pub fn increment_chunks(&self, id: &str) -> Result<u64, SessionError> {
        let handle = self.handle(id)?;
        Ok(handle.with_mut(|session| {
            session.chunk_count += 1;
            session.chunk_count
        }))
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start_ms: u64, end_ms: u64) -> Segment {
        Segment {
            start_ms,
            end_ms,
            text: "text".to_string(),
            translated_text: "translated".to_string(),
            audio_path: PathBuf::from("a.mp3"),
        }
    }

    #[test]
    fn test_create_get_delete() {
        let store = SessionStore::new(10);
        let id = store.create().unwrap();

        let session = store.get(&id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.timeline_cursor_ms, 0);
        assert_eq!(session.chunk_count, 0);
        assert!(session.segments.is_empty());

        store.delete(&id).unwrap();
        assert!(matches!(store.get(&id), Err(SessionError::NotFound(_))));
        assert!(matches!(store.delete(&id), Err(SessionError::NotFound(_))));
        assert!(matches!(
            store.advance_cursor(&id, 500),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_advance_cursor_allocates_contiguous_spans() {
        let store = SessionStore::new(10);
        let id = store.create().unwrap();

        let (start, end) = store.advance_cursor(&id, 1500).unwrap();
        assert_eq!((start, end), (0, 1500));

        let (start, end) = store.advance_cursor(&id, 200).unwrap();
        assert_eq!((start, end), (1500, 1700));

        assert_eq!(store.get(&id).unwrap().timeline_cursor_ms, 1700);
    }

    #[test]
    fn test_segments_append_in_order() {
        let store = SessionStore::new(10);
        let id = store.create().unwrap();

        store.append_segment(&id, segment(0, 1500)).unwrap();
        store.append_segment(&id, segment(1500, 3000)).unwrap();

        let session = store.get(&id).unwrap();
        assert_eq!(session.segments.len(), 2);
        assert_eq!(session.segments[1].start_ms, session.segments[0].end_ms);
    }

    #[test]
    fn test_capacity_limit() {
        let store = SessionStore::new(1);
        let _id = store.create().unwrap();
        assert!(matches!(
            store.create(),
            Err(SessionError::CapacityReached(1))
        ));
    }

    #[test]
    fn test_video_path_and_chunk_counter() {
        let store = SessionStore::new(10);
        let id = store.create().unwrap();

        store
            .set_video_path(&id, PathBuf::from("/tmp/video.webm"))
            .unwrap();
        assert_eq!(store.increment_chunks(&id).unwrap(), 1);
        assert_eq!(store.increment_chunks(&id).unwrap(), 2);

        let session = store.get(&id).unwrap();
        assert_eq!(session.video_path, Some(PathBuf::from("/tmp/video.webm")));
        assert_eq!(session.chunk_count, 2);
    }
}
