//! # Session Management
//!
//! Owns every live dubbing session and its segment history. Each session
//! carries the timeline cursor that aligns synthesized audio with the source
//! video, so all mutation goes through the store and is serialized per
//! session.
//!
//! ## Session Lifecycle:
//! 1. **Created**: `create()` registers an empty session
//! 2. **Ingesting**: chunks advance the cursor and append segments
//! 3. **Video attached**: an upload sets the session's video path
//! 4. **Rendered**: render reads a snapshot of the accumulated segments
//! 5. **Stopped**: `delete()` removes all state; later operations fail with
//!    `NotFound`

pub mod store;

pub use store::{Segment, Session, SessionError, SessionHandle, SessionStore};
