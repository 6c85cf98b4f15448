
pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod io;
pub mod learner;
pub mod model;

use tracing::*;

pub use config::CompressionConfig;
pub use data::{AttrType, AttrValue, Count, Schema, Tuple, TypeRegistry, TypeTag};
pub use driver::{Driver, SamplingDriver};
pub use error::{Error, Result};
pub use learner::{ModelLearner, Phase};
pub use model::{CategoricalModel, Model, ProbInterval};

/// Objects that can be recorded in the log
pub trait Loggable {
    fn log( &self, message: &str, level: tracing::Level );
}

/// Emits an event at a level chosen at runtime.
pub(crate) fn log_at( level: Level, message: &str ) {
    if level == Level::ERROR { error!( "{message}" ) }
    else if level == Level::WARN { warn!( "{message}" ) }
    else if level == Level::INFO { info!( "{message}" ) }
    else if level == Level::DEBUG { debug!( "{message}" ) }
    else { trace!( "{message}" ) }
}
