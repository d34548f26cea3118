pub mod checks;
pub mod etl;
pub mod export;
pub mod normalize;
pub mod pipeline;

pub use crate::domain::model::{CheckedObservation, Observation, TransformResult};
pub use crate::domain::ports::{ConfigProvider, ObservationSource, Pipeline, Storage};
pub use crate::utils::error::Result;
