
use serde::Serialize;

use crate::data::{AttrValue, Tuple};
use crate::error::{Error, Result};

mod categorical;
mod distribution;

pub use categorical::{CategoricalModel, ModelFormatter};
pub use distribution::Distribution;

/// Half-open probability range `[l, r)` assigned to one attribute value.
#[derive( Debug, Clone, Copy, PartialEq, Serialize )]
pub struct ProbInterval {
    pub l: f64,
    pub r: f64,
}

impl ProbInterval {
    pub fn new( l: f64, r: f64 ) -> ProbInterval {
	ProbInterval { l, r }
    }

    pub fn width( &self ) -> f64 {
	self.r - self.l
    }

    /// Code length of a value occupying this interval, in bits
    pub fn bits( &self ) -> f64 {
	-f64::log2( self.width() )
    }

    /// Maps `inner` into this interval, the way an arithmetic coder narrows its range.
    pub fn nest( &self, inner: &ProbInterval ) -> ProbInterval {
	let width = self.width();
	ProbInterval::new( self.l + inner.l * width, self.l + inner.r * width )
    }

    pub fn contains( &self, point: f64 ) -> bool {
	self.l <= point && point < self.r
    }
}

/// Conditional distribution of one attribute given its predictors.
pub trait Model {
    /// The attribute this model predicts
    fn target_var( &self ) -> usize;

    /// Attributes conditioned on, in order. Empty for marginal models.
    fn predictor_list( &self ) -> &[usize];

    /// Appends the interval of the target value found in `tuple`.
    fn get_prob_interval( &self, tuple: &Tuple, intervals: &mut Vec<ProbInterval> ) -> Result<()>;

    /// Resolves the target value whose interval contains `point`, appends that interval and returns the value.
    /// Only the predictors have to be present in `tuple`.
    fn decode_value( &self, tuple: &Tuple, point: f64, intervals: &mut Vec<ProbInterval> ) -> Result<AttrValue>;

    /// Estimated size of the stored model in bits
    fn description_length( &self ) -> f64;
}

/// Computes one interval per attribute, in processing order.
pub fn encode_tuple <M: Model> ( models: &[M], order: &[usize], tuple: &Tuple ) -> Result<Vec<ProbInterval>> {
    let mut intervals = Vec::with_capacity( order.len() );
    for attr in order {
	model_of( models, *attr )?.get_prob_interval( tuple, &mut intervals )?;
    }
    Ok( intervals )
}

/// Rebuilds a tuple from one point per attribute, given in processing order.
pub fn decode_tuple <M: Model> ( models: &[M], order: &[usize], points: &[f64] ) -> Result<(Tuple, Vec<ProbInterval>)> {
    if points.len() != order.len() {
	return Err( Error::PointCount { expected: order.len(), got: points.len() } );
    }
    let mut tuple = Tuple::new( models.len() );
    let mut intervals = Vec::with_capacity( order.len() );
    for (attr, point) in order.iter().zip( points ) {
	let value = model_of( models, *attr )?.decode_value( &tuple, *point, &mut intervals )?;
	tuple.set( *attr, value )?;
    }
    Ok( (tuple, intervals) )
}

fn model_of <M: Model> ( models: &[M], attr: usize ) -> Result<&M> {
    models.get( attr ).ok_or( Error::AttrOutOfRange { attr, len: models.len() } )
}

/// Total code length of a tuple's intervals in bits
pub fn code_length( intervals: &[ProbInterval] ) -> f64 {
    intervals.iter().map( |pi| pi.bits() ).sum()
}
