//! Veil Core Library
//!
//! This crate provides the reactive filter overlay used by the Veil page
//! scripts: a persistent, idempotent hide/keep decision over a page whose
//! content keeps changing underneath it.
//!
//! # Architecture
//!
//! Settings are loaded once from a key/value backend and are authoritative
//! for the life of the page. Every render pass re-extracts candidates from
//! the live tree and recomputes decisions from scratch; nothing is carried
//! over between passes except the tree itself. A debounced scheduler turns
//! structural change notifications, navigation and visibility signals into
//! render passes.
//!
//! # Modules
//!
//! - `patterns`: Free-text pattern list parsing and normalized matching
//! - `settings`: Filter settings and the durable settings store
//! - `matcher`: Predicate engine mapping a candidate to a decision
//! - `tree`: Tree and change-feed abstractions
//! - `dom`: In-memory tree implementation
//! - `extract`: Page-specific title/group key extraction
//! - `render`: Render pass applying decisions to the tree
//! - `scheduler`: Coalescing reapplication scheduler
//! - `status`: Status projection of the last render pass
//! - `overlay`: The overlay instance tying everything together
//! - `rewrite`: Idempotent link rewriting
//! - `url`: Href path extraction
//! - `types`: Shared type definitions

pub mod dom;
pub mod extract;
pub mod matcher;
pub mod overlay;
pub mod patterns;
pub mod render;
pub mod rewrite;
pub mod scheduler;
pub mod settings;
pub mod status;
pub mod tree;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use dom::{Element, VirtualDom};
pub use extract::{Extractor, PageExtractor};
pub use matcher::decide;
pub use overlay::{Overlay, OverlayConfig, Preset};
pub use patterns::{normalize, parse_pattern_list, PatternSet, Separators};
pub use render::{render, RenderOutcome};
pub use rewrite::LinkRewriter;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use settings::{MemoryStorage, Settings, SettingsStore, StorageBackend, StorageError};
pub use status::StatusReport;
pub use tree::{CandidateShape, ChangeFeed, MutationRecord, NodeId, Tree};
pub use types::{CandidateItem, Decision, Features, FilterKind, HostSignal, KindMask, MatchReason};
