pub mod backup;
pub mod normalize;
