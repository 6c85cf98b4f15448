//! Compression configuration consumed by the model learner.

use serde::{Deserialize, Serialize};

use crate::data::Schema;
use crate::error::{Error, Result};

fn default_max_predictors() -> usize { 2 }
fn default_max_refine_passes() -> usize { 3 }

#[derive( Serialize, Deserialize, Debug, Clone, PartialEq )]
pub struct CompressionConfig {
    /// Tolerated deviation of every cumulative probability boundary, one entry per attribute
    pub allowed_err: Vec<f64>,
    /// Attribute the input is grouped by. Placed first and never given predictors.
    #[serde( default )]
    pub sort_by_attr: Option<usize>,
    /// Largest predictor set considered during structure search
    #[serde( default = "default_max_predictors" )]
    pub max_predictors: usize,
    /// Upper bound on full passes before the models are frozen
    #[serde( default = "default_max_refine_passes" )]
    pub max_refine_passes: usize,
}

impl CompressionConfig {
    pub fn new( allowed_err: Vec<f64> ) -> CompressionConfig {
	CompressionConfig {
	    allowed_err,
	    sort_by_attr: None,
	    max_predictors: default_max_predictors(),
	    max_refine_passes: default_max_refine_passes(),
	}
    }

    /// Same tolerance for all `num_attrs` attributes
    pub fn uniform( num_attrs: usize, allowed_err: f64 ) -> CompressionConfig {
	CompressionConfig::new( vec!( allowed_err; num_attrs ))
    }

    pub fn with_sort_by_attr( mut self, attr: Option<usize> ) -> CompressionConfig {
	self.sort_by_attr = attr;
	self
    }

    pub fn with_max_predictors( mut self, max: usize ) -> CompressionConfig {
	self.max_predictors = max;
	self
    }

    pub fn with_max_refine_passes( mut self, max: usize ) -> CompressionConfig {
	self.max_refine_passes = max;
	self
    }

    /// Checks the configuration against the schema it will be used with.
    pub fn validate( &self, schema: &Schema ) -> Result<()> {
	if self.allowed_err.len() != schema.len() {
	    return Err( Error::ErrorBoundCount { expected: schema.len(), got: self.allowed_err.len() } );
	}
	for (attr, err) in self.allowed_err.iter().enumerate() {
	    if !err.is_finite() || *err < 0.0 {
		return Err( Error::InvalidErrorBound { attr, value: *err } );
	    }
	}
	if let Some( attr ) = self.sort_by_attr {
	    if attr >= schema.len() {
		return Err( Error::SortAttrOutOfRange { attr, len: schema.len() } );
	    }
	}
	Ok( () )
    }
}
