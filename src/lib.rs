//! xcraft etc - layered module configuration
//!
//! Resolves each module's configuration from three layers: schema defaults
//! merged with override sources and persisted under `<root>/etc`, the cached
//! persisted file, and the runtime layer shared between live instances of
//! the host process through run files under `<root>/var/run`. Also drives
//! the interactive reconfiguration of all modules.

pub mod constants;
pub mod error;
pub mod manager;
pub mod overrides;
pub mod probe;
pub mod registry;
pub mod schema;
pub mod store;
pub mod wizard;

mod json_file;

pub use error::{EtcError, Result};
pub use manager::{SharedStore, StoreManager};
pub use overrides::{OverrideSource, SourceOrigin, SourceRecord};
pub use probe::{ProcessProbe, SystemProbe};
pub use registry::{DaemonRegistry, RuntimeLayer, SweepReport};
pub use schema::{ModuleFilter, ModuleSchema};
pub use store::{CreateReport, EtcStore, StoreOptions};
pub use wizard::{Answers, ModuleOutcome, Prompter, ReconfigureReport, WizardItem};

pub use xcraft_overlay::{FieldDef, ModuleConfig, ModuleOverrides, OverrideValue, Overrides};
