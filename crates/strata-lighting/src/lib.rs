//! Sky light propagation across locked area neighbourhoods.

pub mod sunlight;
pub mod world_section;

pub use sunlight::{
    LightNode, LightQueues, SunlightEngine, add_sunlight, initial_sunlight, propagate_add, propagate_remove,
    remove_sunlight,
};
pub use world_section::{LightWorld, LightWorldSection};
