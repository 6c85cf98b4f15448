
use serde::ser::SerializeStruct;

use crate::io::{produce_list, PrettyFormatter};
use crate::model::{Distribution, Model};

use super::CategoricalModel;

pub struct ModelFormatter {
    show_contexts: bool,
}

impl PrettyFormatter<CategoricalModel> for ModelFormatter {

    fn format_pretty( &self, model: &CategoricalModel ) -> String {
	let mut output = String::new();
	output.push( '\n' ); // so output begins on a new line
	output = join_lines( output, format_header( model ));

	if self.show_contexts {
	    output = model.sorted_contexts().into_iter()
		.map( |(context, dist)| format_distribution( &produce_list( context.iter(), "(", ", ", ")" ), dist ))
		.fold( output, join_lines );
	    output = join_lines( output, format_distribution( "*", model.fallback() ));
	}
	output
    }
}

/// Summary of the learned structure. Distributions are not part of it.
impl serde::Serialize for CategoricalModel {
    fn serialize<S>( &self, serializer: S ) -> Result<S::Ok, S::Error> where S: serde::Serializer {
	let mut summary = serializer.serialize_struct( "CategoricalModel", 5 )?;
	summary.serialize_field( "target", &self.target )?;
	summary.serialize_field( "predictors", &self.predictors )?;
	summary.serialize_field( "domain_size", &self.domain.len() )?;
	summary.serialize_field( "contexts", &self.contexts.len() )?;
	summary.serialize_field( "description_bits", &self.description_length() )?;
	summary.end()
    }
}

fn format_header( model: &CategoricalModel ) -> String {
    let predictors = produce_list( model.predictor_list().iter(), "[", ", ", "]" );
    format!( "attribute {} | {predictors}  ({} contexts, {:.0} bits)",
	     model.target_var(), model.num_contexts(), model.description_length() )
}

fn format_distribution( context: &str, dist: &Distribution ) -> String {
    let boundaries = produce_list( dist.boundaries().map( |b| format!( "{b:.3}" )), "", " ", "" );
    format!( "  {context}: {boundaries}" )
}

fn join_lines( mut accumulator: String, addition: String ) -> String {
    accumulator.push_str( addition.as_str() );
    accumulator.push( '\n' );
    accumulator
}

impl Default for ModelFormatter {
    fn default() -> Self {
	ModelFormatter::new()
    }
}

impl ModelFormatter {
    pub fn new() -> ModelFormatter {
	ModelFormatter {
	    show_contexts: false,
	}
    }

    pub fn show_contexts( &mut self ) { self.show_contexts = true; }
}
