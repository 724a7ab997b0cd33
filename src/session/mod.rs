// ABOUTME: Local terminal sessions shown as tabs
// Registry and active selection, render sinks, and geometry synchronisation

pub mod registry;
pub mod resize;
pub mod search;
pub mod sink;

pub use registry::{CycleDirection, Session, SessionId, SessionInput, SessionRegistry, SinkFactory, DEFAULT_LABEL};
pub use resize::{ResizeEvent, ResizeNotifier};
pub use search::{SearchDirection, SearchMatch};
pub use sink::{DataCallback, EmulatorSink, Highlight, RenderSink, Viewport};
