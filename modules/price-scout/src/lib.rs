pub mod aggregator;
pub mod browser;
pub mod deps;
pub mod discovery;
pub mod extractor;
pub mod fallback;
pub mod pipeline;
pub mod refiner;
pub mod renderer;
pub mod search;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use deps::ScoutDeps;
pub use pipeline::PriceDiscoveryPipeline;
