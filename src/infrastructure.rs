//! Infrastructure layer for provider access, configuration and output
//!
//! Everything that touches the network, the filesystem or process-wide state
//! lives here. The application layer only sees the `SourceClient` seam.

pub mod config; // Layered configuration and defaults
pub mod http_client; // Rate-limited HTTP client
pub mod logging; // Logging infrastructure
pub mod result_writer; // CSV/JSON output
pub mod sources; // Provider adapters

pub use config::{AppConfig, ConfigManager, Credentials, LoggingConfig, OutputConfig, SourceConfig};
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::{get_log_directory, init_logging_with_config};
pub use result_writer::{ResultWriter, WriteReport};
pub use sources::{PageRequest, SourceClient, SourcePage, build_client};
