//! Multi-pass estimation of one conditional model per attribute.
//!
//! The learner is a three-phase state machine driven by an external loop:
//!
//! - `Structure`: sampled passes; each pass places one more attribute in the dependency order
//!   together with the predictor set that codes it most cheaply.
//! - `Refine`: full passes counting the values of every attribute per predictor context of the
//!   chosen structure, until the fitted distributions are final.
//! - `Done`: models are frozen and can be handed out.

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::config::CompressionConfig;
use crate::data::{Schema, Tuple};
use crate::error::{Error, Result};
use crate::model::CategoricalModel;
use crate::{log_at, Loggable};

mod counts;
mod refine;
mod structure;

pub use counts::ContextCounts;
pub use structure::Placement;

use refine::RefinePass;
use structure::StructureSearch;

#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize )]
pub enum Phase {
    Structure,
    Refine,
    Done,
}

pub struct ModelLearner {
    schema: Schema,
    config: CompressionConfig,
    phase: Phase,
    structure: StructureSearch,
    refine: RefinePass,
    /// models of the last full pass, compared against the next one
    previous: Option<Vec<CategoricalModel>>,
    models: Vec<CategoricalModel>,
    iteration: usize,
    refine_passes: usize,
}

impl ModelLearner {

    /// Fails if the configuration does not fit the schema.
    pub fn new( schema: Schema, config: CompressionConfig ) -> Result<ModelLearner> {
	config.validate( &schema )?;
	let structure = StructureSearch::new( schema.len(), config.sort_by_attr, config.max_predictors );
	let mut learner = ModelLearner {
	    refine: RefinePass::new( Vec::new(), None ),
	    schema,
	    config,
	    phase: Phase::Structure,
	    structure,
	    previous: None,
	    models: Vec::new(),
	    iteration: 0,
	    refine_passes: 0,
	};
	if learner.structure.is_complete() {
	    learner.begin_refine();
	}
	Ok( learner )
    }

    pub fn phase( &self ) -> Phase {
	self.phase
    }

    /// Number of completed passes
    pub fn iteration( &self ) -> usize {
	self.iteration
    }

    /// True if the next pass must feed every tuple, false if a sample suffices.
    pub fn require_full_pass( &self ) -> bool {
	self.phase == Phase::Refine
    }

    pub fn require_more_iterations( &self ) -> bool {
	self.phase != Phase::Done
    }

    pub fn feed_tuple( &mut self, tuple: &Tuple ) -> Result<()> {
	self.schema.check_tuple( tuple )?;
	match self.phase {
	    Phase::Structure => self.structure.feed( tuple ),
	    Phase::Refine => self.refine.feed( tuple ),
	    Phase::Done => Err( Error::Phase { operation: "feed_tuple", actual: self.phase } ),
	}
    }

    /// Closes the current pass.
    pub fn end_of_data( &mut self ) -> Result<()> {
	if self.phase == Phase::Done {
	    return Err( Error::Phase { operation: "end_of_data", actual: self.phase } );
	}
	self.iteration += 1;
	let _span = info_span!( "pass", number = self.iteration, phase = ?self.phase ).entered();
	match self.phase {
	    Phase::Structure => self.finish_structure_pass(),
	    _ => self.finish_refine_pass(),
	}
	Ok( () )
    }

    /// Processing order of the attributes, usable for encoding and decoding alike.
    pub fn order_of_attributes( &self ) -> Result<&[usize]> {
	self.require_done( "order_of_attributes" )?;
	Ok( self.structure.order() )
    }

    /// Returns a copy of the frozen model of `attr`.
    pub fn get_model( &self, attr: usize ) -> Result<CategoricalModel> {
	self.require_done( "get_model" )?;
	self.models.get( attr ).cloned().ok_or( Error::AttrOutOfRange { attr, len: self.models.len() } )
    }

    /// Hands over all frozen models, indexed by attribute.
    pub fn into_models( self ) -> Result<Vec<CategoricalModel>> {
	self.require_done( "into_models" )?;
	Ok( self.models )
    }

    fn require_done( &self, operation: &'static str ) -> Result<()> {
	if self.phase == Phase::Done { Ok( () ) } else { Err( Error::Phase { operation, actual: self.phase } ) }
    }

    fn finish_structure_pass( &mut self ) {
	if let Some( placement ) = self.structure.end_pass() {
	    info!( "attribute {} placed with predictors {:?} ({:.1} bits)",
		   placement.target, placement.predictors, placement.cost );
	}
	if self.structure.is_complete() {
	    self.begin_refine();
	} else {
	    debug!( "{} candidates for the next pass", self.structure.num_candidates() );
	}
    }

    fn begin_refine( &mut self ) {
	info!( "dependency order {:?}", self.structure.order() );
	self.phase = Phase::Refine;
	self.refine = RefinePass::new( self.structure.predictor_sets(), self.config.sort_by_attr );
    }

    fn finish_refine_pass( &mut self ) {
	self.refine_passes += 1;
	let fitted = self.refine.fit( &self.schema, &self.config.allowed_err );
	info!( "fitted {} models from {} tuples", fitted.len(), self.refine.tuples() );

	let converged = if self.refine.is_exact() {
	    info!( "input is grouped by the sort attribute, counts are final" );
	    true
	} else if let Some( previous ) = &self.previous {
	    let stable = previous.iter().zip( fitted.iter() )
		.all( |(before, after)| before.max_deviation( after ) <= after.allowed_err() );
	    if stable {
		info!( "distributions stable after {} full passes", self.refine_passes );
	    }
	    stable
	} else {
	    false
	};

	if converged || self.refine_passes >= self.config.max_refine_passes.max( 1 ) {
	    if !converged {
		warn!( "stopping after {} full passes without stable distributions", self.refine_passes );
	    }
	    self.models = fitted;
	    self.previous = None;
	    self.refine = RefinePass::new( Vec::new(), None );
	    self.phase = Phase::Done;
	} else {
	    self.previous = Some( fitted );
	    self.refine = RefinePass::new( self.structure.predictor_sets(), self.config.sort_by_attr );
	}
    }
}

impl Loggable for ModelLearner {
    fn log( &self, message: &str, level: tracing::Level ) {
	log_at( level, &format!( "{message}: phase {:?} after {} passes, order {:?}",
				  self.phase, self.iteration, self.structure.order() ));
	for model in &self.models {
	    model.log( "model", level );
	}
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use rand::prelude::*;

    use super::*;
    use crate::data::{AttrValue, EnumType, IntegerType, TypeRegistry};
    use crate::model::{decode_tuple, encode_tuple, Model, ProbInterval};

    macro_rules! assert_approx {
	($real:expr, $expected:expr, $delta:expr) => {
	    if $real < $expected - $delta || $real > $expected + $delta {
		panic!( "Violate {:.4} == {:.4} (+-{:.4})", $real, $expected, $delta );
	    }
	}
    }

    fn enums( values: &[u32] ) -> Tuple {
	Tuple::from_values( values.iter().map( |v| AttrValue::Enum( *v )))
    }

    fn binary_schema( n: usize ) -> Schema {
	let mut registry = TypeRegistry::new();
	registry.register( 0, EnumType::new() );
	Schema::new( &registry, &vec!( 0; n )).unwrap()
    }

    /// 5000 x (0,0), 3000 x (0,1), 2000 x (1,1), in that order
    fn two_attribute_data() -> Vec<Tuple> {
	let mut data = Vec::new();
	for (tuple, count) in [([0, 0], 5000), ([0, 1], 3000), ([1, 1], 2000)] {
	    data.extend( std::iter::repeat( enums( &tuple )).take( count ));
	}
	data
    }

    /// Runs the learner feeding `sample` whenever a full pass is not required
    fn learn( learner: &mut ModelLearner, data: &[Tuple], sample: &[Tuple] ) {
	while learner.require_more_iterations() {
	    let feed = if learner.require_full_pass() { data } else { sample };
	    for t in feed {
		learner.feed_tuple( t ).unwrap();
	    }
	    learner.end_of_data().unwrap();
	}
    }

    #[test]
    fn test_without_primary_attr() {
	let data = two_attribute_data();
	let mut learner = ModelLearner::new( binary_schema( 2 ), CompressionConfig::uniform( 2, 0.01 )).unwrap();
	learn( &mut learner, &data, &data );

	assert_eq!( learner.order_of_attributes().unwrap(), &[0, 1] );
	let a = learner.get_model( 0 ).unwrap();
	let b = learner.get_model( 1 ).unwrap();
	assert_eq!( a.target_var(), 0 );
	assert!( a.predictor_list().is_empty() );
	assert_eq!( b.target_var(), 1 );
	assert_eq!( b.predictor_list(), &[0] );

	let mut intervals = Vec::new();
	a.get_prob_interval( &data[ 5000 ], &mut intervals ).unwrap();
	b.get_prob_interval( &data[ 5000 ], &mut intervals ).unwrap();
	assert_eq!( intervals.len(), 2 );
	assert_approx!( intervals[ 0 ].l, 0.0, 0.01 );
	assert_approx!( intervals[ 0 ].r, 0.8, 0.01 );
	assert_approx!( intervals[ 1 ].l, 0.625, 0.01 );
	assert_approx!( intervals[ 1 ].r, 1.0, 0.01 );
	// two structure passes, then two agreeing full passes
	assert_eq!( learner.iteration(), 4 );
    }

    #[test]
    fn test_with_primary_attr() {
	let data = two_attribute_data();
	let sample: Vec<Tuple> = data[ 0 .. 500 ].iter()
	    .chain( data[ 5000 .. 5200 ].iter() )
	    .chain( data[ 8000 .. 8100 ].iter() )
	    .cloned()
	    .collect();
	let config = CompressionConfig::uniform( 2, 0.01 ).with_sort_by_attr( Some( 1 ));
	let mut learner = ModelLearner::new( binary_schema( 2 ), config ).unwrap();
	assert!( !learner.require_full_pass() );
	learn( &mut learner, &data, &sample );

	assert_eq!( learner.order_of_attributes().unwrap(), &[1, 0] );
	let a = learner.get_model( 0 ).unwrap();
	let b = learner.get_model( 1 ).unwrap();
	assert_eq!( a.predictor_list(), &[1] );
	assert!( b.predictor_list().is_empty() );

	let mut intervals = Vec::new();
	b.get_prob_interval( &data[ 5000 ], &mut intervals ).unwrap();
	a.get_prob_interval( &data[ 5000 ], &mut intervals ).unwrap();
	assert_eq!( intervals.len(), 2 );
	assert_approx!( intervals[ 0 ].l, 0.5, 0.01 );
	assert_approx!( intervals[ 0 ].r, 1.0, 0.01 );
	assert_approx!( intervals[ 1 ].l, 0.0, 0.01 );
	assert_approx!( intervals[ 1 ].r, 0.6, 0.01 );
	assert_approx!( intervals[ 1 ].r, 0.625, 0.05 );
	// one sampled pass and a single full pass over grouped input
	assert_eq!( learner.iteration(), 2 );
    }

    #[test]
    fn test_exact_counts_at_zero_error() {
	let data = two_attribute_data();
	let mut learner = ModelLearner::new( binary_schema( 2 ), CompressionConfig::uniform( 2, 0.0 )).unwrap();
	learn( &mut learner, &data, &data );
	let models = learner.into_models().unwrap();
	let intervals = encode_tuple( &models, &[0, 1], &enums( &[0, 1] )).unwrap();
	assert_eq!( intervals, vec!( ProbInterval::new( 0.0, 0.8 ), ProbInterval::new( 0.625, 1.0 )));
    }

    #[test]
    fn test_phase_protocol() {
	let data = two_attribute_data();
	let mut learner = ModelLearner::new( binary_schema( 2 ), CompressionConfig::uniform( 2, 0.0 )).unwrap();
	assert_eq!( learner.phase(), Phase::Structure );
	assert!( matches!( learner.order_of_attributes(), Err( Error::Phase { actual: Phase::Structure, .. } )));
	assert!( matches!( learner.get_model( 0 ), Err( Error::Phase { .. } )));

	let mut full_pass_flags = Vec::new();
	while learner.require_more_iterations() {
	    full_pass_flags.push( learner.require_full_pass() );
	    for t in &data {
		learner.feed_tuple( t ).unwrap();
	    }
	    learner.end_of_data().unwrap();
	}
	assert_eq!( full_pass_flags, vec!( false, false, true, true ));
	assert_eq!( learner.phase(), Phase::Done );
	assert!( matches!( learner.feed_tuple( &data[ 0 ] ), Err( Error::Phase { actual: Phase::Done, .. } )));
	assert!( matches!( learner.end_of_data(), Err( Error::Phase { .. } )));
	assert!( matches!( learner.get_model( 2 ), Err( Error::AttrOutOfRange { attr: 2, len: 2 } )));
    }

    #[test]
    fn test_configuration_errors() {
	let result = ModelLearner::new( binary_schema( 2 ), CompressionConfig::uniform( 1, 0.0 ));
	assert!( matches!( result, Err( Error::ErrorBoundCount { expected: 2, got: 1 } )));
	let config = CompressionConfig::uniform( 2, 0.0 ).with_sort_by_attr( Some( 5 ));
	assert!( matches!( ModelLearner::new( binary_schema( 2 ), config ), Err( Error::SortAttrOutOfRange { .. } )));
    }

    #[test]
    fn test_rejects_malformed_tuples() {
	let mut learner = ModelLearner::new( binary_schema( 2 ), CompressionConfig::uniform( 2, 0.0 )).unwrap();
	assert!( matches!( learner.feed_tuple( &enums( &[0] )), Err( Error::TupleArity { expected: 2, got: 1 } )));
	let mut partial = Tuple::new( 2 );
	partial.set( 0, AttrValue::Enum( 0 )).unwrap();
	assert!( matches!( learner.feed_tuple( &partial ), Err( Error::MissingValue( 1 ))));
    }

    #[test]
    fn test_single_attribute_starts_refining() {
	for sort_by_attr in [None, Some( 0 )] {
	    let config = CompressionConfig::uniform( 1, 0.0 ).with_sort_by_attr( sort_by_attr );
	    let mut learner = ModelLearner::new( binary_schema( 1 ), config ).unwrap();
	    assert!( learner.require_full_pass() );
	    let data: Vec<Tuple> = ( 0 .. 10 ).map( |i| enums( &[i / 5] )).collect();
	    learn( &mut learner, &data, &[] );
	    assert_eq!( learner.order_of_attributes().unwrap(), &[0] );
	}
    }

    #[test]
    /// A single observed value gets the whole unit interval
    fn test_degenerate_attribute() {
	let data: Vec<Tuple> = ( 0 .. 100 ).map( |i| enums( &[i % 3, 7] )).collect();
	let mut learner = ModelLearner::new( binary_schema( 2 ), CompressionConfig::uniform( 2, 0.05 )).unwrap();
	learn( &mut learner, &data, &data );
	let constant = learner.get_model( 1 ).unwrap();
	let mut intervals = Vec::new();
	constant.get_prob_interval( &data[ 4 ], &mut intervals ).unwrap();
	assert_eq!( intervals, vec!( ProbInterval::new( 0.0, 1.0 )));
    }

    #[test]
    /// Empty structure samples still produce a complete order
    fn test_empty_sample() {
	let data = two_attribute_data();
	let mut learner = ModelLearner::new( binary_schema( 3 ), CompressionConfig::uniform( 3, 0.0 )).unwrap();
	let wide: Vec<Tuple> = data.iter().map( |t| {
	    let mut values = t.project( &[0, 1] ).unwrap();
	    values.push( AttrValue::Enum( 0 ));
	    Tuple::from_values( values )
	}).collect();
	learn( &mut learner, &wide, &[] );
	assert_eq!( learner.order_of_attributes().unwrap(), &[0, 1, 2] );
	for attr in 0 .. 3 {
	    assert!( learner.get_model( attr ).unwrap().predictor_list().is_empty() );
	}
    }

    #[test]
    /// An ungrouped sort attribute needs agreeing full passes like any other input
    fn test_ungrouped_sort_attr() {
	let mut data = two_attribute_data();
	data.swap( 0, 9999 );
	let config = CompressionConfig::uniform( 2, 0.0 ).with_sort_by_attr( Some( 1 ));
	let mut learner = ModelLearner::new( binary_schema( 2 ), config ).unwrap();
	learn( &mut learner, &data, &data );
	assert_eq!( learner.iteration(), 3 );
	assert_eq!( learner.order_of_attributes().unwrap(), &[1, 0] );
    }

    #[test]
    /// Full passes that keep disagreeing stop at the pass limit
    fn test_pass_limit() {
	let data = two_attribute_data();
	let config = CompressionConfig::uniform( 2, 0.0 ).with_max_refine_passes( 2 );
	let mut learner = ModelLearner::new( binary_schema( 2 ), config ).unwrap();
	let mut passes = 0;
	while learner.require_more_iterations() {
	    let feed = if learner.require_full_pass() { passes += 1; &data[ passes * 10 .. ] } else { &data[ .. ] };
	    for t in feed {
		learner.feed_tuple( t ).unwrap();
	    }
	    learner.end_of_data().unwrap();
	}
	assert_eq!( passes, 2 );
	assert_eq!( learner.iteration(), 4 );
    }

    /// Correlated data over three enum attributes and one integer attribute
    fn generated_data( seed: u64, n: usize ) -> (Schema, Vec<Tuple>) {
	let mut registry = TypeRegistry::new();
	registry.register( 0, EnumType::new() );
	registry.register( 1, IntegerType );
	let schema = Schema::new( &registry, &[0, 0, 1, 0] ).unwrap();

	let mut rng = StdRng::seed_from_u64( seed );
	let data = ( 0 .. n ).map( |_| {
	    let a: u32 = rng.gen_range( 0 .. 4 );
	    let b: u32 = if rng.gen_bool( 0.9 ) { a % 2 } else { rng.gen_range( 0 .. 2 ) };
	    let c: i64 = ( a + b ) as i64 * 10 + if rng.gen_bool( 0.2 ) { 1 } else { 0 };
	    let d: u32 = rng.gen_range( 0 .. 3 );
	    Tuple::from_values( vec!( AttrValue::Enum( a ), AttrValue::Enum( b ), AttrValue::Integer( c ), AttrValue::Enum( d )))
	}).collect();
	(schema, data)
    }

    #[test]
    /// Order is a topological permutation; every boundary is within tolerance of the data
    fn test_learned_model_properties() {
	for (seed, err, sort_by_attr) in [(1, 0.0, None), (2, 0.01, None), (3, 0.05, Some( 3 )), (4, 0.2, Some( 0 ))] {
	    let (schema, data) = generated_data( seed, 2000 );
	    let sample: Vec<Tuple> = data.iter().step_by( 4 ).cloned().collect();
	    let config = CompressionConfig::uniform( 4, err ).with_sort_by_attr( sort_by_attr );
	    let mut learner = ModelLearner::new( schema, config ).unwrap();
	    learn( &mut learner, &data, &sample );

	    let order = learner.order_of_attributes().unwrap().to_vec();
	    let mut sorted = order.clone();
	    sorted.sort();
	    assert_eq!( sorted, vec!( 0, 1, 2, 3 ));
	    if let Some( primary ) = sort_by_attr {
		assert_eq!( order[ 0 ], primary );
		assert!( learner.get_model( primary ).unwrap().predictor_list().is_empty() );
	    }

	    let models = learner.into_models().unwrap();
	    for (position, attr) in order.iter().enumerate() {
		let model = &models[ *attr ];
		assert_eq!( model.target_var(), *attr );
		for predictor in model.predictor_list() {
		    let predictor_position = order.iter().position( |a| a == predictor ).unwrap();
		    assert!( predictor_position < position, "{predictor} must precede {attr}" );
		}
		check_boundaries( model, &data, err );
	    }

	    // every tuple encodes and decodes through the chain of models
	    for tuple in data.iter().take( 50 ) {
		let intervals = encode_tuple( &models, &order, tuple ).unwrap();
		assert_eq!( intervals.len(), 4 );
		let points: Vec<f64> = intervals.iter().map( |pi| ( pi.l + pi.r ) / 2.0 ).collect();
		let (decoded, _) = decode_tuple( &models, &order, &points ).unwrap();
		assert_eq!( &decoded, tuple );
	    }
	}
    }

    fn check_boundaries( model: &CategoricalModel, data: &[Tuple], err: f64 ) {
	let mut exact: HashMap<Vec<AttrValue>, HashMap<AttrValue, u64>> = HashMap::new();
	for tuple in data {
	    let context = tuple.project( model.predictor_list() ).unwrap();
	    let value = tuple.value( model.target_var() ).unwrap().clone();
	    *exact.entry( context ).or_default().entry( value ).or_insert( 0 ) += 1;
	}
	for (context, counts) in exact {
	    let dist = model.distribution( &context ).unwrap();
	    let n: u64 = counts.values().sum();
	    let mut running = 0;
	    let boundaries: Vec<f64> = dist.boundaries().collect();
	    assert_eq!( boundaries.len(), model.domain().len() );
	    assert_eq!( boundaries.last().copied(), Some( 1.0 ));
	    for (value, boundary) in model.domain().iter().zip( boundaries ) {
		running += counts.get( value ).copied().unwrap_or( 0 );
		assert_approx!( boundary, running as f64 / n as f64, err + 1e-12 );
	    }
	}
    }

    #[test]
    fn test_idempotent_queries() {
	let (schema, data) = generated_data( 9, 500 );
	let mut learner = ModelLearner::new( schema, CompressionConfig::uniform( 4, 0.02 )).unwrap();
	learn( &mut learner, &data, &data );
	let order = learner.order_of_attributes().unwrap().to_vec();
	let models = learner.into_models().unwrap();
	for tuple in data.iter().take( 20 ) {
	    assert_eq!( encode_tuple( &models, &order, tuple ).unwrap(), encode_tuple( &models, &order, tuple ).unwrap() );
	}
    }
}
