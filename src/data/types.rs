
use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::AttrValue;
use crate::error::{Error, Result};

/// Key under which an attribute type is registered.
pub type TypeTag = u32;

/// Capability of an attribute base type: parsing, ordering and, for finite types, enumeration.
pub trait AttrType: Debug + Send + Sync {
    fn name( &self ) -> &str;

    /// Parses a single textual field
    fn parse( &self, token: &str ) -> Result<AttrValue>;

    /// Total order of the domain. Cumulative distributions follow this order.
    fn compare( &self, left: &AttrValue, right: &AttrValue ) -> Ordering {
	left.cmp( right )
    }

    /// All values of a finite domain in ascending order, `None` for open domains.
    fn domain( &self ) -> Option<Vec<AttrValue>> {
	None
    }
}

/// Caller-owned map from type tags to type capabilities.
#[derive( Debug, Default, Clone )]
pub struct TypeRegistry {
    types: FxHashMap<TypeTag, Arc<dyn AttrType>>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
	TypeRegistry::default()
    }

    /// Registers a type, replacing any previous type under the same tag
    pub fn register <T> ( &mut self, tag: TypeTag, attr_type: T ) where T: AttrType + 'static {
	self.types.insert( tag, Arc::new( attr_type ));
    }

    pub fn get( &self, tag: TypeTag ) -> Option<Arc<dyn AttrType>> {
	self.types.get( &tag ).cloned()
    }
}

/// Categorical values coded as small integers, optionally with a known number of categories.
#[derive( Debug, Clone, Default )]
pub struct EnumType {
    cardinality: Option<u32>,
}

impl EnumType {
    pub fn new() -> EnumType {
	EnumType { cardinality: None }
    }

    pub fn with_cardinality( cardinality: u32 ) -> EnumType {
	EnumType { cardinality: Some( cardinality ) }
    }
}

impl AttrType for EnumType {
    fn name( &self ) -> &str { "enum" }

    fn parse( &self, token: &str ) -> Result<AttrValue> {
	let value: u32 = token.parse().map_err( |e: std::num::ParseIntError| parse_error( self, token, e.to_string() ))?;
	match self.cardinality {
	    Some( n ) if value >= n => Err( parse_error( self, token, format!( "category exceeds cardinality {n}" ))),
	    _ => Ok( AttrValue::Enum( value )),
	}
    }

    fn domain( &self ) -> Option<Vec<AttrValue>> {
	self.cardinality.map( |n| ( 0 .. n ).map( AttrValue::Enum ).collect() )
    }
}

#[derive( Debug, Clone, Copy, Default )]
pub struct IntegerType;

impl AttrType for IntegerType {
    fn name( &self ) -> &str { "integer" }

    fn parse( &self, token: &str ) -> Result<AttrValue> {
	token.parse()
	    .map( AttrValue::Integer )
	    .map_err( |e: std::num::ParseIntError| parse_error( self, token, e.to_string() ))
    }
}

#[derive( Debug, Clone, Copy, Default )]
pub struct TextType;

impl AttrType for TextType {
    fn name( &self ) -> &str { "text" }

    fn parse( &self, token: &str ) -> Result<AttrValue> {
	Ok( AttrValue::Text( token.to_string() ))
    }
}

fn parse_error( attr_type: &dyn AttrType, token: &str, reason: String ) -> Error {
    Error::Parse { token: token.to_string(), type_name: attr_type.name().to_string(), reason }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_enum_domain() {
	let closed = EnumType::with_cardinality( 3 );
	assert_eq!( closed.domain(), Some( vec!( AttrValue::Enum( 0 ), AttrValue::Enum( 1 ), AttrValue::Enum( 2 ))));
	assert_eq!( EnumType::new().domain(), None );
	assert!( EnumType::new().parse( "4000" ).is_ok() );
	assert!( closed.parse( "-1" ).is_err() );
    }

    #[test]
    fn test_integer_order() {
	let ty = IntegerType;
	let small = ty.parse( "-3" ).unwrap();
	let large = ty.parse( "12" ).unwrap();
	assert_eq!( ty.compare( &small, &large ), Ordering::Less );
	assert!( ty.parse( "1.5" ).is_err() );
    }

    #[test]
    fn test_registry_replaces() {
	let mut registry = TypeRegistry::new();
	registry.register( 4, IntegerType );
	registry.register( 4, TextType );
	assert_eq!( registry.get( 4 ).unwrap().name(), "text" );
	assert!( registry.get( 5 ).is_none() );
    }
}
