
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::data::{AttrValue, Count, Schema, Tuple};
use crate::error::Result;
use crate::model::CategoricalModel;

use super::ContextCounts;

/// Full-pass counts for a fixed structure.
#[derive( Debug )]
pub struct RefinePass {
    predictors: Vec<Vec<usize>>,
    tables: Vec<ContextCounts>,
    grouping: Option<GroupTracker>,
    tuples: Count,
}

/// Watches whether the values of one attribute arrive in contiguous runs.
#[derive( Debug )]
struct GroupTracker {
    attr: usize,
    current: Option<AttrValue>,
    finished: FxHashSet<AttrValue>,
    grouped: bool,
}

impl RefinePass {

    pub fn new( predictors: Vec<Vec<usize>>, sort_by_attr: Option<usize> ) -> RefinePass {
	let tables = predictors.iter().map( |_| ContextCounts::new() ).collect();
	RefinePass {
	    predictors,
	    tables,
	    grouping: sort_by_attr.map( GroupTracker::new ),
	    tuples: 0,
	}
    }

    pub fn feed( &mut self, tuple: &Tuple ) -> Result<()> {
	for (target, (predictors, table)) in self.predictors.iter().zip( self.tables.iter_mut() ).enumerate() {
	    let context = tuple.project( predictors )?;
	    table.add( context, tuple.value( target )?.clone() );
	}
	if let Some( tracker ) = self.grouping.as_mut() {
	    tracker.observe( tuple.value( tracker.attr )? );
	}
	self.tuples += 1;
	Ok( () )
    }

    pub fn tuples( &self ) -> Count {
	self.tuples
    }

    /// True if the sort attribute was seen in contiguous groups, so one pass yields the final counts.
    pub fn is_exact( &self ) -> bool {
	self.tuples > 0 && self.grouping.as_ref().map_or( false, |tracker| tracker.grouped )
    }

    /// Fits one model per attribute from this pass's counts.
    pub fn fit( &self, schema: &Schema, allowed_err: &[f64] ) -> Vec<CategoricalModel> {
	( 0 .. self.tables.len() ).into_par_iter()
	    .map( |target| CategoricalModel::fit(
		target,
		self.predictors[ target ].clone(),
		&self.tables[ target ],
		schema.attr_type( target ).as_ref(),
		allowed_err[ target ],
	    ))
	    .collect()
    }
}

impl GroupTracker {
    fn new( attr: usize ) -> GroupTracker {
	GroupTracker { attr, current: None, finished: FxHashSet::default(), grouped: true }
    }

    fn observe( &mut self, value: &AttrValue ) {
	if self.current.as_ref() == Some( value ) {
	    return;
	}
	if self.finished.contains( value ) {
	    if self.grouped {
		debug!( "attribute {} is not grouped: {value} reappears", self.attr );
	    }
	    self.grouped = false;
	    return;
	}
	if let Some( previous ) = self.current.take() {
	    self.finished.insert( previous );
	}
	self.current = Some( value.clone() );
    }
}
