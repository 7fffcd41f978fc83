//! String conversion of blackboard values.
//!
//! Literals in a tree description are always strings. A node that reads such a
//! port as, say, `f64` gets it converted through the table kept here. The table
//! is keyed by [`TypeId`] and fixed once the tree is built.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;

use crate::{error::ConversionError, ValueType};

type ParseFn = Rc<dyn Fn(&str) -> Result<Rc<dyn Any>, ConversionError>>;
type FormatFn = Rc<dyn Fn(&dyn Any) -> Option<String>>;

#[derive(Clone)]
struct Converter {
    type_name: &'static str,
    parse: ParseFn,
    format: Option<FormatFn>,
}

/// Type-indexed table of (parse, format) functions.
#[derive(Clone)]
pub struct Converters {
    table: HashMap<TypeId, Converter>,
}

impl Default for Converters {
    fn default() -> Self {
        let mut ret = Self::empty();
        ret.register::<i8>();
        ret.register::<i16>();
        ret.register::<i32>();
        ret.register::<i64>();
        ret.register::<isize>();
        ret.register::<u8>();
        ret.register::<u16>();
        ret.register::<u32>();
        ret.register::<u64>();
        ret.register::<usize>();
        ret.register::<f32>();
        ret.register::<f64>();
        ret.register::<char>();
        ret.register::<String>();
        ret.insert::<bool>(Rc::new(parse_bool), Some(display::<bool>()));
        ret
    }
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.table.values().map(|c| c.type_name))
            .finish()
    }
}

impl Converters {
    /// A table without the built-in conversions.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Registers a type through its `FromStr` and `Display` implementations.
    pub fn register<T>(&mut self)
    where
        T: FromStr + Display + 'static,
        T::Err: Display,
    {
        self.insert::<T>(
            Rc::new(|s: &str| {
                s.trim()
                    .parse::<T>()
                    .map_err(|e| ConversionError::new(s, type_name::<T>(), e))
            }),
            Some(display::<T>()),
        );
    }

    /// Registers a type with a custom parser and no string formatting.
    pub fn register_parser<T: 'static>(
        &mut self,
        parse: impl Fn(&str) -> Result<T, ConversionError> + 'static,
    ) {
        self.insert::<T>(Rc::new(parse), None);
    }

    fn insert<T: 'static>(
        &mut self,
        parse: Rc<dyn Fn(&str) -> Result<T, ConversionError>>,
        format: Option<FormatFn>,
    ) {
        self.table.insert(
            TypeId::of::<T>(),
            Converter {
                type_name: type_name::<T>(),
                parse: Rc::new(move |s: &str| {
                    let value = parse(s)?;
                    Ok(Rc::new(value) as Rc<dyn Any>)
                }),
                format,
            },
        );
    }

    pub fn contains(&self, ty: TypeId) -> bool {
        self.table.contains_key(&ty)
    }

    /// Parses `text` into the type identified by `ty`.
    pub fn parse_dyn(&self, ty: ValueType, text: &str) -> Result<Rc<dyn Any>, ConversionError> {
        let converter = self.table.get(&ty.id).ok_or_else(|| {
            ConversionError::new(text, ty.name, "no converter is registered for this type")
        })?;
        (converter.parse)(text)
    }

    pub fn parse<T: Clone + 'static>(&self, text: &str) -> Result<T, ConversionError> {
        let value = self.parse_dyn(ValueType::of::<T>(), text)?;
        value
            .downcast::<T>()
            .map(|value| Rc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
            .map_err(|_| ConversionError::new(text, type_name::<T>(), "converter produced another type"))
    }

    /// Formats a type-erased value, if its type has a formatter.
    pub fn format(&self, value: &dyn Any) -> Option<String> {
        let converter = self.table.get(&value.type_id())?;
        converter.format.as_ref().and_then(|format| format(value))
    }
}

fn display<T: Display + 'static>() -> FormatFn {
    Rc::new(|value: &dyn Any| value.downcast_ref::<T>().map(|v| v.to_string()))
}

fn parse_bool(s: &str) -> Result<bool, ConversionError> {
    match s.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other if other.eq_ignore_ascii_case("true") => Ok(true),
        other if other.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ConversionError::new(s, "bool", "expected true, false, 1 or 0")),
    }
}

/// Splits a delimited literal such as `"1;2;3"` into trimmed, non-empty parts.
pub fn split_literal(text: &str, delimiter: char) -> Vec<&str> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Position2D {
        x: f64,
        y: f64,
    }

    fn parse_position(s: &str) -> Result<Position2D, ConversionError> {
        let parts = split_literal(s, ';');
        if parts.len() != 2 {
            return Err(ConversionError::new(s, "Position2D", "expected 2 fields"));
        }
        let field = |p: &str| {
            p.parse::<f64>()
                .map_err(|e| ConversionError::new(s, "Position2D", e))
        };
        Ok(Position2D {
            x: field(parts[0])?,
            y: field(parts[1])?,
        })
    }

    #[test]
    fn builtin_numbers() {
        let converters = Converters::default();
        assert_eq!(converters.parse::<i32>(" 42 "), Ok(42));
        assert_eq!(converters.parse::<f64>("2.5"), Ok(2.5));
        assert!(converters.parse::<u8>("300").is_err());
    }

    #[test]
    fn bool_accepts_digits() {
        let converters = Converters::default();
        assert_eq!(converters.parse::<bool>("TRUE"), Ok(true));
        assert_eq!(converters.parse::<bool>("0"), Ok(false));
        let err = converters.parse::<bool>("maybe").unwrap_err();
        assert_eq!(err.literal, "maybe");
        assert_eq!(err.type_name, "bool");
    }

    #[test]
    fn custom_parser() {
        let mut converters = Converters::default();
        assert!(!converters.contains(TypeId::of::<Position2D>()));
        converters.register_parser(parse_position);
        assert_eq!(
            converters.parse::<Position2D>("1;2"),
            Ok(Position2D { x: 1., y: 2. })
        );
        let err = converters.parse::<Position2D>("1;2;3").unwrap_err();
        assert_eq!(err.literal, "1;2;3");
    }

    #[test]
    fn unknown_type_names_literal_and_type() {
        let converters = Converters::empty();
        let err = converters.parse::<i32>("7").unwrap_err();
        assert_eq!(err.literal, "7");
        assert_eq!(err.type_name, "i32");
    }

    #[test]
    fn format_known_values() {
        let converters = Converters::default();
        assert_eq!(converters.format(&3usize), Some("3".to_owned()));
        assert_eq!(converters.format(&vec![1]), None);
    }
}
