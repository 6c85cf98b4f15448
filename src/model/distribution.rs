
use serde::Serialize;

use crate::data::Count;

use super::ProbInterval;

/// Finest grid tried before falling back to exact counts
const MAX_PRECISION: u32 = 32;

/// Cumulative distribution over the slots of a domain, stored as integer numerators over a common total.
#[derive( Debug, Clone, PartialEq, Eq, Serialize )]
pub struct Distribution {
    /// upper boundary numerator of every slot; non-decreasing, the last entry equals `total`
    cumulative: Vec<u64>,
    total: u64,
}

impl Distribution {

    /// Stores the empirical frequencies as they are.
    pub fn exact( counts: &[Count] ) -> Distribution {
	let mut running = 0;
	let cumulative = counts.iter()
	    .map( |c| { running += c; running } )
	    .collect();
	Distribution { cumulative, total: running }
    }

    /// Rounds the empirical boundaries onto the coarsest dyadic grid that keeps every boundary
    /// within `allowed_err` and every observed value at positive width.
    pub fn approximate( counts: &[Count], allowed_err: f64 ) -> Distribution {
	let n: Count = counts.iter().sum();
	if n == 0 || !( allowed_err > 0.0 ) {
	    return Distribution::exact( counts );
	}
	for precision in 1 ..= MAX_PRECISION {
	    let scale: u64 = 1 << precision;
	    // rounding to nearest is off by at most half a grid step
	    if 0.5 / scale as f64 > allowed_err {
		continue;
	    }
	    if scale >= n {
		break;
	    }
	    if let Some( cumulative ) = round_onto_grid( counts, n, scale ) {
		return Distribution { cumulative, total: scale };
	    }
	}
	Distribution::exact( counts )
    }

    pub fn len( &self ) -> usize {
	self.cumulative.len()
    }

    /// True if no data backs this distribution
    pub fn is_empty( &self ) -> bool {
	self.total == 0
    }

    pub fn total( &self ) -> u64 {
	self.total
    }

    /// Bits needed to store one boundary
    pub fn precision_bits( &self ) -> u32 {
	u64::BITS - self.total.leading_zeros()
    }

    fn lower( &self, slot: usize ) -> u64 {
	if slot == 0 { 0 } else { self.cumulative[ slot - 1 ] }
    }

    /// Interval of the slot, `None` if the slot has zero width.
    pub fn interval( &self, slot: usize ) -> Option<ProbInterval> {
	let (lower, upper) = (self.lower( slot ), *self.cumulative.get( slot )?);
	if upper <= lower {
	    return None;
	}
	let total = self.total as f64;
	Some( ProbInterval::new( lower as f64 / total, upper as f64 / total ))
    }

    /// Finds the slot whose interval contains `point`, for `point` in [0, 1).
    pub fn locate( &self, point: f64 ) -> Option<usize> {
	if self.is_empty() || !( 0.0 ..1.0 ).contains( &point ) {
	    return None;
	}
	let total = self.total as f64;
	// first boundary above the point, divided exactly as in `interval`; zero-width slots share the previous boundary
	let slot = self.cumulative.partition_point( |upper| *upper as f64 / total <= point );
	if slot < self.len() { Some( slot ) } else { None }
    }

    /// Upper boundaries of all slots as probabilities
    pub fn boundaries( &self ) -> impl Iterator<Item = f64> + '_ {
	let total = self.total as f64;
	self.cumulative.iter().map( move |c| if total > 0.0 { *c as f64 / total } else { 0.0 } )
    }

    /// Largest boundary difference to another distribution over the same domain.
    /// Distributions over different domains differ by the maximum of 1.
    pub fn max_deviation( &self, other: &Distribution ) -> f64 {
	if self.len() != other.len() || self.is_empty() != other.is_empty() {
	    return 1.0;
	}
	self.boundaries().zip( other.boundaries() )
	    .map( |(left, right)| ( left - right ).abs() )
	    .fold( 0.0, f64::max )
    }
}

fn round_onto_grid( counts: &[Count], n: Count, scale: u64 ) -> Option<Vec<u64>> {
    let (n, wide_scale) = (n as u128, scale as u128);
    let mut cumulative = Vec::with_capacity( counts.len() );
    let (mut running, mut previous) = (0u128, 0u64);
    for count in counts {
	running += *count as u128;
	let rounded = ( ( 2 * running * wide_scale + n ) / ( 2 * n )) as u64;
	if *count > 0 && rounded <= previous {
	    return None;
	}
	cumulative.push( rounded );
	previous = rounded;
    }
    Some( cumulative )
}
