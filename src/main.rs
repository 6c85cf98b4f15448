
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn, Level};

use attrmodel::{io, CategoricalModel, CompressionConfig, Driver, Error, Loggable, Model, ModelLearner};
use attrmodel::{SamplingDriver, Schema, Tuple, TypeRegistry, TypeTag};
use attrmodel::data::{EnumType, IntegerType, TextType};
use attrmodel::model::{code_length, encode_tuple};

const ENUM_TAG: TypeTag = 0;
const INTEGER_TAG: TypeTag = 1;
const TEXT_TAG: TypeTag = 2;

#[derive( Parser )]
#[command( name = "learner" )]
#[command( about = "Learns per-attribute conditional models of a delimited table" )]
struct Args {
    /// Input table, one tuple per line
    input: String,

    /// Attribute types in column order: enum, int or text
    #[arg( short, long, value_delimiter = ',', required = true )]
    types: Vec<String>,

    /// Tolerated boundary error, either one value for all attributes or one per attribute
    #[arg( short = 'e', long, value_delimiter = ',', default_value = "0.01" )]
    allowed_err: Vec<f64>,

    /// Attribute the input is grouped by
    #[arg( long )]
    sort_by: Option<usize>,

    /// JSON compression configuration; overrides the error and sort options
    #[arg( long )]
    config: Option<String>,

    /// Fraction of tuples fed during structure passes
    #[arg( long, default_value = "0.1" )]
    sample_rate: f64,

    #[arg( long, default_value = "0" )]
    seed: u64,

    /// Field separator; blank means any whitespace
    #[arg( long, default_value = " " )]
    separator: String,

    /// Writes a JSON report of the learned models
    #[arg( short, long )]
    report: Option<String>,

    #[arg( short, long )]
    verbose: bool,
}

#[derive( Serialize )]
struct Report<'a> {
    tuples: usize,
    order: &'a [usize],
    models: &'a [CategoricalModel],
    data_bits: f64,
    model_bits: f64,
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    prepare_logging( args.verbose );
    run( &args ).map_err( |e| e.to_string() )
}

fn run( args: &Args ) -> attrmodel::Result<()> {
    let registry = registry();
    let tags = args.types.iter()
	.map( |name| type_tag( name ))
	.collect::<attrmodel::Result<Vec<TypeTag>>>()?;
    let schema = Schema::new( &registry, &tags )?;
    let config = compression_config( args, schema.len() )?;

    let data: Vec<Tuple> = io::read_tuples( &args.input, schema.clone(), args.separator.clone() )?.collect();
    info!( "read {} tuples with {} attributes", data.len(), schema.len() );

    let mut learner = ModelLearner::new( schema, config )?;
    let mut driver = SamplingDriver::new( args.sample_rate, args.seed )?;
    driver.learn( &data, &mut learner )?;

    let order = learner.order_of_attributes()?.to_vec();
    let models = learner.into_models()?;
    for model in &models {
	model.log( "learned", Level::INFO );
    }

    let mut data_bits = 0.0;
    for tuple in &data {
	match encode_tuple( &models, &order, tuple ) {
	    Ok( intervals ) => data_bits += code_length( &intervals ),
	    Err( err ) => warn!( "tuple not encodable: {err}" ),
	}
    }
    let model_bits: f64 = models.iter().map( |m| m.description_length() ).sum();
    info!( "data {data_bits:.0} bits, models {model_bits:.0} bits" );

    if let Some( path ) = &args.report {
	let report = Report { tuples: data.len(), order: &order, models: &models, data_bits, model_bits };
	io::write_report( &report, path )?;
	info!( "report written to {path}" );
    }
    Ok( () )
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register( ENUM_TAG, EnumType::new() );
    registry.register( INTEGER_TAG, IntegerType );
    registry.register( TEXT_TAG, TextType );
    registry
}

fn type_tag( name: &str ) -> attrmodel::Result<TypeTag> {
    match name.trim() {
	"enum" => Ok( ENUM_TAG ),
	"int" | "integer" => Ok( INTEGER_TAG ),
	"text" | "string" => Ok( TEXT_TAG ),
	other => Err( Error::Parse { token: other.to_string(), type_name: "type name".to_string(), reason: "expected enum, int or text".to_string() } ),
    }
}

fn compression_config( args: &Args, num_attrs: usize ) -> attrmodel::Result<CompressionConfig> {
    if let Some( path ) = &args.config {
	let text = std::fs::read_to_string( path )?;
	return Ok( serde_json::from_str( &text )? );
    }
    let allowed_err = match args.allowed_err.as_slice() {
	[err] => vec!( *err; num_attrs ),
	errs => errs.to_vec(),
    };
    Ok( CompressionConfig::new( allowed_err ).with_sort_by_attr( args.sort_by ))
}

fn prepare_logging( verbose: bool ) {
    let level = if verbose { tracing_subscriber::filter::LevelFilter::DEBUG } else { tracing_subscriber::filter::LevelFilter::INFO };
    let tracer = tracing_subscriber::fmt::fmt()
	.with_max_level( level )
	.finish();
    if tracing::subscriber::set_global_default( tracer ).is_err() {
	eprintln!( "logging was already initialized" );
    }
}
