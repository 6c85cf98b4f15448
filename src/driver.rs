
use rand::prelude::*;
use tracing::{debug, info, info_span};

use crate::data::Tuple;
use crate::error::{Error, Result};
use crate::learner::ModelLearner;
use crate::{Loggable, Phase};

/// Runs passes over the data until the learner is done.
pub trait Driver {
    fn learn( &mut self, data: &[Tuple], learner: &mut ModelLearner ) -> Result<()>;
}

/// Feeds a Bernoulli sample of the data whenever the learner does not ask for a full pass.
pub struct SamplingDriver {
    sample_rate: f64,
    rng: StdRng,
}

impl SamplingDriver {
    pub fn new( sample_rate: f64, seed: u64 ) -> Result<SamplingDriver> {
	if !( sample_rate > 0.0 && sample_rate <= 1.0 ) {
	    return Err( Error::InvalidSampleRate( sample_rate ));
	}
	Ok( SamplingDriver { sample_rate, rng: StdRng::seed_from_u64( seed ) } )
    }

    fn pass( &mut self, data: &[Tuple], learner: &mut ModelLearner ) -> Result<u64> {
	let full = learner.require_full_pass();
	let mut fed = 0;
	for tuple in data {
	    if full || self.rng.gen_bool( self.sample_rate ) {
		learner.feed_tuple( tuple )?;
		fed += 1;
	    }
	}
	learner.end_of_data()?;
	Ok( fed )
    }
}

impl Driver for SamplingDriver {
    fn learn( &mut self, data: &[Tuple], learner: &mut ModelLearner ) -> Result<()> {
	let mut iteration = 0;
	while learner.require_more_iterations() {
	    iteration += 1;
	    let _span = info_span!( "iteration", number = iteration ).entered();
	    let phase = learner.phase();
	    let fed = self.pass( data, learner )?;
	    info!( "{phase:?} pass fed {fed} of {} tuples", data.len() );
	}
	debug_assert_eq!( learner.phase(), Phase::Done );
	learner.log( "learned models", tracing::Level::DEBUG );
	debug!( "learning finished after {iteration} passes" );
	Ok( () )
    }
}
