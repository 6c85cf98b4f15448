
use bit_set::BitSet;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::data::Tuple;
use crate::error::Result;

use super::ContextCounts;

/// Relative cost difference below which two candidates count as tied
const TIE_TOLERANCE: f64 = 1e-9;

/// Greedy dependency-order search. Every pass over a sample places one attribute.
#[derive( Debug )]
pub struct StructureSearch {
    num_attrs: usize,
    max_predictors: usize,
    order: Vec<usize>,
    placed: BitSet,
    /// predictor list per attribute; final once the attribute is placed
    predictors: Vec<Vec<usize>>,
    candidates: Vec<Candidate>,
}

/// An unplaced attribute together with one admissible predictor set
#[derive( Debug )]
struct Candidate {
    target: usize,
    predictors: Vec<usize>,
    counts: ContextCounts,
}

/// The choice made at the end of a pass
#[derive( Debug, Clone, PartialEq )]
pub struct Placement {
    pub target: usize,
    pub predictors: Vec<usize>,
    /// estimated code length of the sample's target values in bits
    pub cost: f64,
}

impl StructureSearch {

    pub fn new( num_attrs: usize, sort_by_attr: Option<usize>, max_predictors: usize ) -> StructureSearch {
	let mut search = StructureSearch {
	    num_attrs,
	    max_predictors,
	    order: Vec::with_capacity( num_attrs ),
	    placed: BitSet::with_capacity( num_attrs ),
	    predictors: vec!( Vec::new(); num_attrs ),
	    candidates: Vec::new(),
	};
	if let Some( attr ) = sort_by_attr {
	    search.place( attr, Vec::new() );
	}
	// a lone attribute has nothing to choose from
	if num_attrs == 1 && search.order.is_empty() {
	    search.place( 0, Vec::new() );
	}
	search.begin_pass();
	search
    }

    pub fn is_complete( &self ) -> bool {
	self.order.len() == self.num_attrs
    }

    /// Attributes placed so far, in placement order
    pub fn order( &self ) -> &[usize] {
	&self.order
    }

    pub fn predictor_sets( &self ) -> Vec<Vec<usize>> {
	self.predictors.clone()
    }

    pub fn num_candidates( &self ) -> usize {
	self.candidates.len()
    }

    /// Counts the tuple's target values for every candidate
    pub fn feed( &mut self, tuple: &Tuple ) -> Result<()> {
	for candidate in self.candidates.iter_mut() {
	    let context = tuple.project( &candidate.predictors )?;
	    let value = tuple.value( candidate.target )?.clone();
	    candidate.counts.add( context, value );
	}
	Ok( () )
    }

    /// Places the cheapest candidate and prepares the next pass.
    /// Ties go to the lowest attribute index, then to fewer and earlier-placed predictors.
    pub fn end_pass( &mut self ) -> Option<Placement> {
	if self.is_complete() {
	    return None;
	}
	let domain_sizes = self.domain_sizes();
	let costs: Vec<f64> = self.candidates.par_iter()
	    .map( |c| c.counts.code_length( domain_sizes[ c.target ] ))
	    .collect();

	let mut best: Option<(usize, f64)> = None;
	for (index, (candidate, cost)) in self.candidates.iter().zip( costs.iter() ).enumerate() {
	    trace!( attr = candidate.target, predictors = ?candidate.predictors, cost, "candidate" );
	    let better = match best {
		None => true,
		Some( (_, best_cost) ) => *cost < best_cost - TIE_TOLERANCE * best_cost.abs().max( 1.0 ),
	    };
	    if better {
		best = Some( (index, *cost) );
	    }
	}

	let (index, cost) = best?;
	let chosen = self.candidates.swap_remove( index );
	let placement = Placement { target: chosen.target, predictors: chosen.predictors, cost };
	self.place( placement.target, placement.predictors.clone() );
	self.begin_pass();
	Some( placement )
    }

    fn place( &mut self, attr: usize, predictors: Vec<usize> ) {
	debug!( "placing attribute {attr} after {:?} with predictors {predictors:?}", self.order );
	self.placed.insert( attr );
	self.order.push( attr );
	self.predictors[ attr ] = predictors;
    }

    /// Enumerates candidates in tie-break order: by target, then by predictor set size, then by placement.
    fn begin_pass( &mut self ) {
	let predictor_sets = subsets( &self.order, self.max_predictors );
	self.candidates = ( 0 .. self.num_attrs )
	    .filter( |attr| !self.placed.contains( *attr ))
	    .flat_map( |target| predictor_sets.iter().map( move |predictors| Candidate {
		target,
		predictors: predictors.clone(),
		counts: ContextCounts::new(),
	    }))
	    .collect();
    }

    /// Distinct sampled values per attribute, read off the candidates without predictors
    fn domain_sizes( &self ) -> Vec<usize> {
	let mut sizes = vec!( 1; self.num_attrs );
	for candidate in self.candidates.iter().filter( |c| c.predictors.is_empty() ) {
	    sizes[ candidate.target ] = candidate.counts.distinct_values().max( 1 );
	}
	sizes
    }
}

/// All subsets of `items` with at most `max_size` members, smaller sets first,
/// each keeping the order of `items`.
fn subsets( items: &[usize], max_size: usize ) -> Vec<Vec<usize>> {
    let mut all = vec!( Vec::new() );
    let mut current: Vec<Vec<usize>> = vec!( Vec::new() );
    // remember where each set of the current size may continue
    let mut next_start: Vec<usize> = vec!( 0 );
    for _ in 0 .. max_size.min( items.len() ) {
	let mut grown = Vec::new();
	let mut grown_start = Vec::new();
	for (set, start) in current.iter().zip( next_start.iter() ) {
	    for position in *start .. items.len() {
		let mut extended = set.clone();
		extended.push( items[ position ] );
		grown.push( extended );
		grown_start.push( position + 1 );
	    }
	}
	all.extend( grown.iter().cloned() );
	current = grown;
	next_start = grown_start;
    }
    all
}
