use tracing::{info, debug};

use rand::prelude::*;
use statrs::distribution::DiscreteUniform;

use std::time::*;

use attrmodel::{CompressionConfig, Driver, ModelLearner, SamplingDriver, Schema, Tuple, TypeRegistry};
use attrmodel::data::{AttrValue, EnumType, IntegerType};
use attrmodel::model::{code_length, encode_tuple};

fn main() -> Result<(), String> {
    prepare_logging();

    let n = 100000;
    let data = generate_table( n, 6, 42 );
    let schema = schema( 6 ).map_err( |e| e.to_string() )?;

    for err in [0.0, 0.001, 0.01, 0.05] {
	benchmark_learning( &schema, &data, err, None )?;
    }
    benchmark_learning( &schema, &data, 0.01, Some( 0 ))?;

    Result::Ok( () )
}

fn schema( num_attrs: usize ) -> attrmodel::Result<Schema> {
    let mut registry = TypeRegistry::new();
    registry.register( 0, EnumType::new() );
    registry.register( 1, IntegerType );
    // every third attribute is numeric
    let tags: Vec<u32> = ( 0 .. num_attrs ).map( |i| if i % 3 == 2 { 1 } else { 0 } ).collect();
    Schema::new( &registry, &tags )
}

fn benchmark_learning( schema: &Schema, data: &[Tuple], err: f64, sort_by_attr: Option<usize> ) -> Result<(), String> {
    info!( "Start benchmark: allowed error {err}, sort attribute {sort_by_attr:?}" );
    let config = CompressionConfig::uniform( schema.len(), err ).with_sort_by_attr( sort_by_attr );
    let mut learner = ModelLearner::new( schema.clone(), config ).map_err( |e| e.to_string() )?;
    let mut driver = SamplingDriver::new( 0.1, 1 ).map_err( |e| e.to_string() )?;

    let start = Instant::now();
    driver.learn( data, &mut learner ).map_err( |e| e.to_string() )?;
    let learn_time = Instant::now().duration_since( start );

    let order = learner.order_of_attributes().map_err( |e| e.to_string() )?.to_vec();
    let passes = learner.iteration();
    let models = learner.into_models().map_err( |e| e.to_string() )?;

    let start = Instant::now();
    let mut bits = 0.0;
    for tuple in data {
	let intervals = encode_tuple( &models, &order, tuple ).map_err( |e| e.to_string() )?;
	bits += code_length( &intervals );
    }
    let encode_time = Instant::now().duration_since( start );

    info!( "Result: learning took {}ms over {passes} passes, order {order:?}", learn_time.as_millis() );
    info!( "encoding {} tuples took {}ms, {:.3} bits per tuple", data.len(), encode_time.as_millis(), bits / data.len() as f64 );
    Ok( () )
}

/// Chain-correlated table: every attribute copies a function of its predecessor with some noise
fn generate_table( n: usize, num_attrs: usize, seed: u64 ) -> Vec<Tuple> {
    let mut gen = StdRng::seed_from_u64( seed );
    let root_dist = DiscreteUniform::new( 0, 7 ).unwrap();
    let noise_dist = DiscreteUniform::new( 0, 3 ).unwrap();

    let table: Vec<Tuple> = ( 0 .. n ).map( |_| {
	let mut previous = root_dist.sample( &mut gen ) as i64;
	let mut values = Vec::with_capacity( num_attrs );
	for attr in 0 .. num_attrs {
	    if attr > 0 {
		previous = if gen.gen_bool( 0.8 ) { previous / 2 + attr as i64 } else { noise_dist.sample( &mut gen ) as i64 };
	    }
	    values.push( if attr % 3 == 2 { AttrValue::Integer( previous * 100 ) } else { AttrValue::Enum( previous as u32 ) } );
	}
	Tuple::from_values( values )
    }).collect();
    debug!( "generated {n} tuples with {num_attrs} attributes" );
    table
}

fn prepare_logging() {
    let tracer = tracing_subscriber::fmt::fmt()
	.with_max_level( tracing_subscriber::filter::LevelFilter::INFO )
	.finish();
    tracing::subscriber::set_global_default( tracer ).unwrap();
}
