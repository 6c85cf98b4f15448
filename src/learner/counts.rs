
use rustc_hash::{FxHashMap, FxHashSet};
use statrs::function::gamma::ln_gamma;

use crate::data::{AttrValue, Count};

/// Dirichlet parameter of the Krichevsky-Trofimov estimator
const KT_ALPHA: f64 = 0.5;

#[derive( Debug, Clone, Default )]
/// Value frequencies of one attribute per predictor context.
pub struct ContextCounts {
    contexts: FxHashMap<Vec<AttrValue>, FxHashMap<AttrValue, Count>>,
    total: Count,
}

impl ContextCounts {
    pub fn new() -> ContextCounts {
	ContextCounts::default()
    }

    pub fn add( &mut self, context: Vec<AttrValue>, value: AttrValue ) {
	self.add_many( context, value, 1 );
    }

    pub fn add_many( &mut self, context: Vec<AttrValue>, value: AttrValue, count: Count ) {
	*self.contexts.entry( context ).or_default().entry( value ).or_insert( 0 ) += count;
	self.total += count;
    }

    pub fn total( &self ) -> Count {
	self.total
    }

    pub fn num_contexts( &self ) -> usize {
	self.contexts.len()
    }

    pub fn iter( &self ) -> impl Iterator<Item = (&Vec<AttrValue>, &FxHashMap<AttrValue, Count>)> {
	self.contexts.iter()
    }

    /// Number of distinct values over all contexts
    pub fn distinct_values( &self ) -> usize {
	let values: FxHashSet<&AttrValue> = self.contexts.values().flat_map( |counts| counts.keys() ).collect();
	values.len()
    }

    /// Adaptive code length in bits of all counted values, each context coded with its own
    /// KT estimator over `domain_size` symbols. Parameter cost is included.
    pub fn code_length( &self, domain_size: usize ) -> f64 {
	self.contexts.values()
	    .map( |counts| kt_code_length( counts.values().copied(), domain_size.max( counts.len() )))
	    .sum()
    }
}

/// -log2 of the KT sequential probability of a sequence with the given symbol counts
fn kt_code_length<I>( counts: I, domain_size: usize ) -> f64 where I: Iterator<Item = Count> {
    let k = domain_size.max( 1 ) as f64;
    let mut n = 0.0;
    let mut log_prob = 0.0;
    for count in counts.filter( |c| *c > 0 ) {
	n += count as f64;
	log_prob += ln_gamma( count as f64 + KT_ALPHA ) - ln_gamma( KT_ALPHA );
    }
    log_prob += ln_gamma( k * KT_ALPHA ) - ln_gamma( n + k * KT_ALPHA );
    -log_prob / f64::ln( 2.0 )
}
