#![deny(missing_docs)]
//! # cortex umbrella crate
//!
//! Single import surface for the cortex agent-memory crates, plus a
//! `prelude` for the happy path. The subsystem keeps an interactive
//! agent's long-lived state inside a fixed memory budget: a bounded
//! document cache, a streaming message reducer, bounded string fields,
//! pressure-driven prompt compaction, a memory watchdog, and a
//! redacting checkpoint serializer.

#[cfg(feature = "blob")]
pub use cortex_blob;
pub use cortex_context;
#[cfg(feature = "monitor")]
pub use cortex_monitor;
pub use cortex_state;
pub use cortex_truncate;
pub use cortex_types;

/// Happy-path imports for wiring cortex into an agent runtime.
pub mod prelude {
    #[cfg(feature = "blob")]
    pub use cortex_blob::{BlobStore, CheckpointSerializer, LazyState};
    pub use cortex_context::{
        AnalyzerConfig, ContextManager, Criticality, ProviderFormat, ToolCallAnalyzer,
    };
    #[cfg(feature = "monitor")]
    pub use cortex_monitor::{
        Alert, AlertLevel, MemoryMonitor, MemorySampler, ProcessSampler, pressure,
    };
    pub use cortex_state::{BoundedStringManager, DocumentCache, reduce_messages};
    pub use cortex_truncate::{TruncateConfig, Truncator};
    pub use cortex_types::{
        BoundedStringConfig, CacheConfig, Content, CortexConfig, Message, MessageWindowConfig,
        MonitorConfig, PressureTable, Role, SerializerConfig, ToolCall,
    };
}
