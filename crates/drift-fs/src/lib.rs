//! Filesystem layer for drift detection
//!
//! Provides content fingerprints, canonical path handling and safe I/O
//! primitives shared by the drift crates.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::{Fingerprint, fingerprint, fingerprint_file};
pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::{NormalizedPath, RelativePath};
