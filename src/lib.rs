//! Bulk DNS resolution against an ordered pool of resolvers.
//!
//! ```no_run
//! use dnskraken::{ResolveOptions, Runner};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let options = ResolveOptions {
//!     concurrency: 5,
//!     resolvers: vec!["208.67.222.222".to_owned(), "208.67.220.220".to_owned()],
//!     ..Default::default()
//! };
//! let runner = Runner::new(options)?;
//! for result in runner.resolve_all(&["example.com", "github.com"]).await {
//!     println!("{} {:?} {:?}", result.target_domain, result.ipv4_addresses, result.resolved_by);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod dns;
pub mod util;

pub use crate::core::common::{LogLevel, ResolveOptions, ResolveResult, Transport};
pub use crate::core::error::{HostError, OptionsError, QueryError};
pub use crate::dns::executor::{HickoryExecutor, QueryExecutor};
pub use crate::dns::runner::Runner;
