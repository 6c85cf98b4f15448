
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::warn;

use crate::data::{Schema, Tuple};
use crate::error::Result;

/// Converts a structure into a string
pub trait PrettyFormatter<T> {
    fn format_pretty( &self, object: &T ) -> String;
}

pub type DataGenerator<T> = Box<dyn Iterator<Item = T>>;

/// Reads delimited records line by line. Lines the schema rejects are logged and skipped.
pub fn read_tuples( path: &str, schema: Schema, separator: String ) -> Result<DataGenerator<Tuple>> {
    let file = File::open( Path::new( path ))?;
    let reader = BufReader::new( file );
    let generator = reader.lines()
	.filter_map( |l| l.ok() )
	.enumerate()
	.filter( |(_, l)| !l.trim().is_empty() )
	.filter_map( move |(number, l)| match parse_tuple( &l, &schema, &separator ) {
	    Ok( tuple ) => Some( tuple ),
	    Err( err ) => {
		warn!( "skipping line {}: {err}", number + 1 );
		None
	    },
	});
    Ok( Box::new( generator ))
}

/// Splits a line by `separator` and parses the fields in schema order
pub fn parse_tuple( line: &str, schema: &Schema, separator: &str ) -> Result<Tuple> {
    if separator.trim().is_empty() {
	schema.parse_tuple( line.split_whitespace() )
    } else {
	schema.parse_tuple( line.split( separator ))
    }
}

/// Joins displayable items with a separator between delimiters
pub fn produce_list<I, T>( items: I, left_delimiter: &str, separator: &str, right_delimiter: &str ) -> String where
    I: Iterator<Item = T>,
    T: Display,
{
    let parts: Vec<String> = items.map( |i| i.to_string() ).collect();
    let mut list = String::new();
    list.push_str( left_delimiter );
    list.push_str( parts.join( separator ).as_str() );
    list.push_str( right_delimiter );
    list
}

/// Writes a serializeable report to a file
pub fn write_report<R: serde::Serialize + ?Sized>( report: &R, path: &str ) -> Result<()> {
    let report_string = serde_json::to_string_pretty( report )?;
    let mut file = File::create( Path::new( path ))?;
    write!( file, "{}", report_string )?;
    Ok( () )
}
