#![allow(non_snake_case)]

// Базовые модули
pub mod config;
pub mod error;
pub mod lock;
pub mod logsink;
pub mod metrics;

// Хост: snapshot service, link binder, пути томов
pub mod host; // src/host/{mod,cim,dir,link,volume}.rs

// Сессия (create -> extract -> cleanup) и host-wide запросы
pub mod session; // src/session/{mod,state,mount,extract}.rs
pub mod fleet;

// Удобные реэкспорты
pub use config::{ShadowConfig, DEFAULT_PATTERN};
pub use error::{CreationStage, ShadowError, TeardownStep, TeardownStepFailure};
pub use fleet::FleetCleanupSummary;
pub use host::{
    CimShadowService, DirShadowService, Host, LinkBinder, ShadowRecord, ShadowService,
    SymlinkBinder,
};
pub use logsink::{
    CapabilityProbe, EnvCapabilityProbe, FixedCapabilityProbe, LoggingMode, SessionLog,
};
pub use session::{BoundSnapshot, SessionState, SnapshotSession};
