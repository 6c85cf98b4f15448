
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod types;

pub use types::{AttrType, EnumType, IntegerType, TextType, TypeRegistry, TypeTag};

pub type Count = u64;

/// A single attribute value. Ordering inside a domain is decided by the attribute's `AttrType`.
#[derive( Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize )]
pub enum AttrValue {
    Enum( u32 ),
    Integer( i64 ),
    Text( String ),
}

impl fmt::Display for AttrValue {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	match self {
	    AttrValue::Enum( v ) => write!( f, "#{v}" ),
	    AttrValue::Integer( v ) => write!( f, "{v}" ),
	    AttrValue::Text( v ) => write!( f, "{v:?}" ),
	}
    }
}

/// Positional attribute values of one record.
/// Slots may be empty while a decoder is still filling them in.
#[derive( Debug, Clone, PartialEq, Eq, Hash )]
pub struct Tuple {
    values: Vec<Option<AttrValue>>,
}

impl Tuple {
    /// Creates a tuple with `len` empty slots
    pub fn new( len: usize ) -> Tuple {
	Tuple { values: vec!( None; len ) }
    }

    pub fn from_values <I> ( values: I ) -> Tuple where I: IntoIterator<Item = AttrValue> {
	Tuple { values: values.into_iter().map( Some ).collect() }
    }

    pub fn len( &self ) -> usize {
	self.values.len()
    }

    pub fn is_empty( &self ) -> bool {
	self.values.is_empty()
    }

    pub fn get( &self, attr: usize ) -> Option<&AttrValue> {
	self.values.get( attr ).and_then( |v| v.as_ref() )
    }

    /// Returns the value of `attr` or a `MissingValue` error
    pub fn value( &self, attr: usize ) -> Result<&AttrValue> {
	self.get( attr ).ok_or( Error::MissingValue( attr ))
    }

    pub fn set( &mut self, attr: usize, value: AttrValue ) -> Result<()> {
	let len = self.values.len();
	let slot = self.values.get_mut( attr ).ok_or( Error::AttrOutOfRange { attr, len } )?;
	*slot = Some( value );
	Ok( () )
    }

    pub fn is_complete( &self ) -> bool {
	self.values.iter().all( |v| v.is_some() )
    }

    /// Collects the values of the given attributes, in the given order.
    pub fn project( &self, attrs: &[usize] ) -> Result<Vec<AttrValue>> {
	attrs.iter().map( |attr| self.value( *attr ).cloned() ).collect()
    }
}

/// Ordered attribute types of a relation. Types are resolved once, when the schema is built.
#[derive( Clone )]
pub struct Schema {
    tags: Vec<TypeTag>,
    types: Vec<Arc<dyn AttrType>>,
}

impl fmt::Debug for Schema {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	let names: Vec<&str> = self.types.iter().map( |t| t.name() ).collect();
	f.debug_struct( "Schema" ).field( "tags", &self.tags ).field( "types", &names ).finish()
    }
}

impl Schema {

    pub fn new( registry: &TypeRegistry, tags: &[TypeTag] ) -> Result<Schema> {
	if tags.is_empty() {
	    return Err( Error::EmptySchema );
	}
	let types = tags.iter()
	    .map( |tag| registry.get( *tag ).ok_or( Error::UnknownTypeTag( *tag )))
	    .collect::<Result<Vec<_>>>()?;
	Ok( Schema { tags: tags.to_vec(), types } )
    }

    pub fn len( &self ) -> usize {
	self.types.len()
    }

    pub fn is_empty( &self ) -> bool {
	self.types.is_empty()
    }

    pub fn tag( &self, attr: usize ) -> TypeTag {
	self.tags[ attr ]
    }

    pub fn attr_type( &self, attr: usize ) -> &Arc<dyn AttrType> {
	&self.types[ attr ]
    }

    /// Builds a tuple from textual fields given in schema order.
    pub fn parse_tuple <'a, I> ( &self, tokens: I ) -> Result<Tuple> where I: IntoIterator<Item = &'a str> {
	let mut tuple = Tuple::new( self.len() );
	let mut got = 0;
	for (attr, token) in tokens.into_iter().enumerate() {
	    got += 1;
	    if attr >= self.len() {
		continue;
	    }
	    tuple.set( attr, self.types[ attr ].parse( token.trim() )? )?;
	}
	if got != self.len() {
	    return Err( Error::TupleArity { expected: self.len(), got } );
	}
	Ok( tuple )
    }

    /// Checks that the tuple has a value for every attribute
    pub fn check_tuple( &self, tuple: &Tuple ) -> Result<()> {
	if tuple.len() != self.len() {
	    return Err( Error::TupleArity { expected: self.len(), got: tuple.len() } );
	}
	for attr in 0 .. tuple.len() {
	    tuple.value( attr )?;
	}
	Ok( () )
    }
}
