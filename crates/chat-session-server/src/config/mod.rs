mod settings;

pub use settings::{
    ArchiveConfig, LlmConfig, NotifierConfig, ServerConfig, SessionConfig, Settings,
    StoreBackendKind, StoreConfig, DEFAULT_SYSTEM_PROMPT,
};
