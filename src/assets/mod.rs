//! Stylesheet and script bundling.
//!
//! Split the way the pipeline runs: fetching a single asset, cleaning it up per kind, storing
//! the concatenated result under a fingerprint, and rewriting renderer attributes to point at
//! the stored artifacts.

mod bundler;
mod cache;
mod fetcher;
mod transform;

pub use bundler::AssetBundler;
pub use cache::{fingerprint, BundleArtifact, BundleCache, SCRIPT_GROUP};
pub use fetcher::{resolve_locator, AssetFetcher, AssetSource, WorkingRootFetcher};
pub use transform::{fold_line_endings, transform, AssetKind, CHUNK_SEPARATOR};
