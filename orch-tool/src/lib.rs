#![deny(missing_docs)]
//! Tool-surface composer (C4): the `writer` and `notes` built-in
//! servers, the fallback-provider bridge, and the composition algorithm
//! that builds a per-execution tool surface from an agent descriptor.

pub mod compose;
pub mod fallback;
pub mod notes;
pub mod writer;

pub use compose::{compose_tool_surface, BuiltinServers, ComposedToolSurface};
pub use fallback::{FallbackGateway, FallbackServer, MockFallbackGateway};
pub use notes::{HttpNotesClient, MockNotesClient, NoteBlock, NotesClient, NotesPage, NotesServer};
pub use writer::WriterServer;
