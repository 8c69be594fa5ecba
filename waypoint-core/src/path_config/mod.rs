//! Path configuration: ordered rules that map URLs to properties.

pub mod matcher;
pub mod rule;
pub mod store;

pub use matcher::resolve;
pub use rule::{ParsedSource, PathRule, RawRule, parse_document};
pub use store::{
    ConfigFetcher, PathConfigSource, PathConfiguration, PathConfigurationStore, load_sources,
};
