pub mod export;
pub mod features;
pub mod model;
