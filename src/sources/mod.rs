//! Remote source handling for logscout.
//!
//! # Architecture
//!
//! - **spec**: parsing of `user@host[:port] ... /path` and `container_id /path` strings
//! - **session**: one-command SSH sessions (`cat`, `ls`) with materialization to temp files
//! - **container**: the same two operations through `docker exec`
//! - **provenance**: [`SourceKind`] and [`Origin`] attached to every discovered file
//!
//! # Usage
//!
//! ```rust,no_run
//! use logscout::sources::{parse_ssh_spec, session, SessionOptions};
//!
//! let spec = parse_ssh_spec("alice@example.com:2222 /var/log/*.log")?;
//! let paths = session::list_files(&spec.descriptor, &SessionOptions::default(), &spec.file_path)?;
//! for path in paths {
//!     println!("{path}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod container;
pub mod provenance;
pub mod session;
pub mod spec;

pub use provenance::{Origin, SourceKind};
pub use session::{HostKeyPolicy, RemoteSession, SessionError, SessionOptions};
pub use spec::{
    ContainerPathSpec, RemoteDescriptor, SourceSpec, SpecError, SshPathSpec,
    parse_container_spec, parse_ssh_spec,
};
