pub mod loader;
pub mod resample;

pub use loader::load;
pub use resample::resample;
