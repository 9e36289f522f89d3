//! Test utilities for minisnap.
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { workspace = true, features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::TestConfigBuilder;
//! use policy::RetentionClass;
//!
//! let config = TestConfigBuilder::new()
//!     .with_volume("/srv/data", [(RetentionClass::Hourly, 24)])
//!     .dry_run()
//!     .build();
//! ```

mod config_builder;

pub use config_builder::TestConfigBuilder;
