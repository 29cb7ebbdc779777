#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod assets;
pub mod attributes;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod resolver;
pub mod response;
pub mod tracker;

pub use assets::{AssetBundler, AssetFetcher, AssetKind, BundleArtifact, BundleCache};
pub use attributes::{RendererAttributes, RESERVED_TEMPLATE_KEY};
pub use config::RendererConfig;
pub use context::RequestContext;
pub use engine::{FetchOptions, RenderEngine};
pub use error::ViewError;
pub use executor::{PlaceholderExecutor, TemplateExecutor};
pub use response::ResponseSink;
pub use tracker::DebugTracker;
