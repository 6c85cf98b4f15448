
mod serialize; // report output and pretty printing of the model

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::data::{AttrType, AttrValue, Count, Tuple};
use crate::error::{Error, Result};
use crate::io::PrettyFormatter;
use crate::learner::ContextCounts;
use crate::{log_at, Loggable};

use super::{Distribution, Model, ProbInterval};

pub use serialize::ModelFormatter;

#[derive( Debug, Clone )]
/// Table of cumulative distributions of the target, one per observed predictor context.
pub struct CategoricalModel {
    target: usize,
    predictors: Vec<usize>,
    /// target values in domain order; slot i of every distribution belongs to domain[i]
    domain: Vec<AttrValue>,
    slots: FxHashMap<AttrValue, usize>,
    contexts: FxHashMap<Vec<AttrValue>, Distribution>,
    /// aggregate over all contexts, used for contexts never seen in training
    fallback: Distribution,
    allowed_err: f64,
}

impl CategoricalModel {

    /// Fits the model to the counts gathered for `predictors`, rounding every distribution within `allowed_err`.
    pub fn fit( target: usize, predictors: Vec<usize>, counts: &ContextCounts, attr_type: &dyn AttrType, allowed_err: f64 ) -> CategoricalModel {
	let domain = build_domain( counts, attr_type );
	let slots: FxHashMap<AttrValue, usize> = domain.iter().cloned().enumerate().map( |(slot, v)| (v, slot) ).collect();

	let mut marginal: Vec<Count> = vec!( 0; domain.len() );
	let mut contexts = FxHashMap::default();
	for (context, value_counts) in counts.iter() {
	    let mut slot_counts: Vec<Count> = vec!( 0; domain.len() );
	    for (value, count) in value_counts {
		let slot = slots[ value ];
		slot_counts[ slot ] += count;
		marginal[ slot ] += count;
	    }
	    contexts.insert( context.clone(), Distribution::approximate( &slot_counts, allowed_err ));
	}

	CategoricalModel {
	    target,
	    predictors,
	    domain,
	    slots,
	    contexts,
	    fallback: Distribution::approximate( &marginal, allowed_err ),
	    allowed_err,
	}
    }

    pub fn domain( &self ) -> &[AttrValue] {
	&self.domain
    }

    pub fn allowed_err( &self ) -> f64 {
	self.allowed_err
    }

    pub fn num_contexts( &self ) -> usize {
	self.contexts.len()
    }

    /// Distribution stored for a predictor context, if it was observed
    pub fn distribution( &self, context: &[AttrValue] ) -> Option<&Distribution> {
	self.contexts.get( context )
    }

    pub fn fallback( &self ) -> &Distribution {
	&self.fallback
    }

    /// Contexts in a stable order
    pub fn sorted_contexts( &self ) -> Vec<(&Vec<AttrValue>, &Distribution)> {
	let mut contexts: Vec<_> = self.contexts.iter().collect();
	contexts.sort_by( |left, right| left.0.cmp( right.0 ));
	contexts
    }

    /// Largest boundary difference to another model of the same attribute.
    /// Models that disagree on structure, domain or observed contexts differ by 1.
    pub fn max_deviation( &self, other: &CategoricalModel ) -> f64 {
	if self.target != other.target || self.predictors != other.predictors || self.domain != other.domain
	    || self.contexts.len() != other.contexts.len()
	{
	    return 1.0;
	}
	self.contexts.iter()
	    .map( |(context, dist)| other.contexts.get( context ).map_or( 1.0, |o| dist.max_deviation( o )))
	    .fold( self.fallback.max_deviation( &other.fallback ), f64::max )
    }

    fn lookup( &self, tuple: &Tuple ) -> Result<&Distribution> {
	if self.fallback.is_empty() {
	    return Err( Error::EmptyModel( self.target ));
	}
	let context = tuple.project( &self.predictors )?;
	Ok( self.contexts.get( &context ).unwrap_or_else( || {
	    trace!( attr = self.target, ?context, "unseen context, using aggregate distribution" );
	    &self.fallback
	}))
    }
}

impl Model for CategoricalModel {

    fn target_var( &self ) -> usize {
	self.target
    }

    fn predictor_list( &self ) -> &[usize] {
	&self.predictors
    }

    fn get_prob_interval( &self, tuple: &Tuple, intervals: &mut Vec<ProbInterval> ) -> Result<()> {
	let dist = self.lookup( tuple )?;
	let value = tuple.value( self.target )?;
	let unencodable = || Error::Unencodable { attr: self.target, value: value.to_string() };
	let slot = *self.slots.get( value ).ok_or_else( unencodable )?;
	let interval = dist.interval( slot ).ok_or_else( unencodable )?;
	intervals.push( interval );
	Ok( () )
    }

    fn decode_value( &self, tuple: &Tuple, point: f64, intervals: &mut Vec<ProbInterval> ) -> Result<AttrValue> {
	let dist = self.lookup( tuple )?;
	let slot = dist.locate( point ).ok_or( Error::InvalidPoint( point ))?;
	let interval = dist.interval( slot ).ok_or( Error::InvalidPoint( point ))?;
	intervals.push( interval );
	Ok( self.domain[ slot ].clone() )
    }

    fn description_length( &self ) -> f64 {
	let table_bits = |dist: &Distribution| ( dist.len() as u64 * dist.precision_bits() as u64 ) as f64;
	let context_bits = self.predictors.len() as f64 * 32.0;
	self.contexts.values()
	    .map( |dist| context_bits + table_bits( dist ))
	    .sum::<f64>()
	    + table_bits( &self.fallback )
    }
}

impl Loggable for CategoricalModel {
    fn log( &self, message: &str, level: tracing::Level ) {
	let mut formatter = ModelFormatter::new();
	formatter.show_contexts();
	log_at( level, &format!( "{message}{}", formatter.format_pretty( self )));
    }
}

/// Declared domain of the type joined with every observed value, in domain order.
fn build_domain( counts: &ContextCounts, attr_type: &dyn AttrType ) -> Vec<AttrValue> {
    let mut values: BTreeSet<AttrValue> = attr_type.domain().unwrap_or_default().into_iter().collect();
    for (_, value_counts) in counts.iter() {
	values.extend( value_counts.keys().cloned() );
    }
    let mut domain: Vec<AttrValue> = values.into_iter().collect();
    domain.sort_by( |left, right| attr_type.compare( left, right ));
    domain
}
