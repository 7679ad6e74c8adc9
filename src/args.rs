//! Constructor argument tuples and step arities.
//!
//! Every construction request carries one [`ArgTuple`]. The same tuple is fed
//! to the allocation step and to the initialization step, each of which
//! declares an [`Arity`] describing how much of the tuple it wants to see.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{SingletonError, SingletonResult};

/// A single dynamically typed constructor argument.
///
/// Equality is structural, which is what the stale-argument check relies on.
/// Floats compare by value except that NaN equals NaN, so a call repeated with
/// the same arguments always matches the stored ones.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::ArgValue;
///
/// assert_eq!(ArgValue::from(3), ArgValue::Int(3));
/// assert_eq!(ArgValue::from("name").as_str(), Some("name"));
/// assert_eq!(ArgValue::from(2).as_float(), Some(2.0));
/// assert_eq!(format!("{}", ArgValue::from(vec![1, 2])), "[1, 2]");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ArgValue>),
}

impl ArgValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(f) => Some(*f),
            ArgValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    /// Short name of the variant, used in argument error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "str",
            ArgValue::List(_) => "list",
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgValue::Null, ArgValue::Null) => true,
            (ArgValue::Bool(a), ArgValue::Bool(b)) => a == b,
            (ArgValue::Int(a), ArgValue::Int(b)) => a == b,
            (ArgValue::Float(a), ArgValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (ArgValue::Str(a), ArgValue::Str(b)) => a == b,
            (ArgValue::List(a), ArgValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => write!(f, "null"),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::Float(x) => write!(f, "{:?}", x),
            ArgValue::Str(s) => write!(f, "'{}'", s),
            ArgValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Int(value as i64)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Int(value as i64)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(values: Vec<T>) -> Self {
        ArgValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ArgValue::Null, Into::into)
    }
}

/// How many of the construction arguments a step receives.
///
/// Allocation and initialization steps are driven by the same argument tuple
/// but may have independent signatures. Each step declares its arity and the
/// engine trims the tuple before the call, so a step never sees arguments it
/// did not ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arity {
    /// No arguments at all (the blank allocator).
    Nullary,
    /// The first `n` positional arguments; keyword arguments are dropped.
    Positional(usize),
    /// The full tuple, positional and keyword.
    #[default]
    Variadic,
}

/// Ordered positional arguments plus named keyword arguments.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{ArgTuple, Arity};
///
/// let args = ArgTuple::new([1, 2, 3]).with_keyword("verbose", true);
/// assert_eq!(args.to_string(), "(1, 2, 3, verbose=true)");
///
/// let trimmed = args.adapt(Arity::Positional(2));
/// assert_eq!(trimmed.to_string(), "(1, 2)");
/// assert!(args.adapt(Arity::Nullary).is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct ArgTuple {
    positional: Vec<ArgValue>,
    keyword: BTreeMap<String, ArgValue>,
}

impl ArgTuple {
    /// Builds a tuple of positional arguments.
    pub fn new<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            keyword: BTreeMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a keyword argument.
    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    pub fn keywords(&self) -> &BTreeMap<String, ArgValue> {
        &self.keyword
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.positional.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&ArgValue> {
        self.keyword.get(name)
    }

    /// Total number of arguments, positional and keyword.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Positional argument `index`, or an `InvalidArgument` error when missing.
    pub fn require(&self, index: usize) -> SingletonResult<&ArgValue> {
        self.positional.get(index).ok_or_else(|| {
            SingletonError::InvalidArgument(format!(
                "missing positional argument {} (got {})",
                index,
                self.positional.len()
            ))
        })
    }

    /// Positional argument `index` as an integer.
    pub fn int(&self, index: usize) -> SingletonResult<i64> {
        let value = self.require(index)?;
        value.as_int().ok_or_else(|| mismatched(index, "int", value))
    }

    /// Positional argument `index` as a float (integers widen).
    pub fn float(&self, index: usize) -> SingletonResult<f64> {
        let value = self.require(index)?;
        value.as_float().ok_or_else(|| mismatched(index, "float", value))
    }

    /// Positional argument `index` as a string slice.
    pub fn string(&self, index: usize) -> SingletonResult<&str> {
        let value = self.require(index)?;
        value.as_str().ok_or_else(|| mismatched(index, "str", value))
    }

    /// Trims the tuple to what a step of the given arity accepts.
    ///
    /// Borrows when nothing has to be dropped.
    pub fn adapt(&self, arity: Arity) -> Cow<'_, ArgTuple> {
        match arity {
            Arity::Variadic => Cow::Borrowed(self),
            Arity::Nullary if self.is_empty() => Cow::Borrowed(self),
            Arity::Nullary => Cow::Owned(ArgTuple::empty()),
            Arity::Positional(n) if self.keyword.is_empty() && self.positional.len() <= n => {
                Cow::Borrowed(self)
            }
            Arity::Positional(n) => Cow::Owned(ArgTuple {
                positional: self.positional.iter().take(n).cloned().collect(),
                keyword: BTreeMap::new(),
            }),
        }
    }
}

fn mismatched(index: usize, expected: &str, found: &ArgValue) -> SingletonError {
    SingletonError::InvalidArgument(format!(
        "positional argument {} must be {}, got {} {}",
        index,
        expected,
        found.kind(),
        found
    ))
}

impl fmt::Display for ArgTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut first = true;
        for value in &self.positional {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", value)?;
        }
        for (name, value) in &self.keyword {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", name, value)?;
        }
        write!(f, ")")
    }
}

impl From<()> for ArgTuple {
    fn from(_: ()) -> Self {
        ArgTuple::empty()
    }
}

impl From<Vec<ArgValue>> for ArgTuple {
    fn from(values: Vec<ArgValue>) -> Self {
        ArgTuple::new(values)
    }
}

impl<T: Into<ArgValue>, const N: usize> From<[T; N]> for ArgTuple {
    fn from(values: [T; N]) -> Self {
        ArgTuple::new(values)
    }
}

impl<T: Into<ArgValue>> FromIterator<T> for ArgTuple {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ArgTuple::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_call_syntax() {
        assert_eq!(ArgTuple::empty().to_string(), "()");
        assert_eq!(ArgTuple::new([0]).to_string(), "(0)");
        let args = ArgTuple::new(vec![ArgValue::from("a"), ArgValue::from(1.5)])
            .with_keyword("z", ArgValue::Null);
        assert_eq!(args.to_string(), "('a', 1.5, z=null)");
        assert_eq!(ArgTuple::empty().with_keyword("k", 1).to_string(), "(k=1)");
    }

    #[test]
    fn test_equality_includes_keywords() {
        let a = ArgTuple::new([1, 2]).with_keyword("k", 3);
        let b = ArgTuple::new([1, 2]).with_keyword("k", 3);
        let c = ArgTuple::new([1, 2]).with_keyword("k", 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ArgTuple::new([1, 2]));
    }

    #[test]
    fn test_float_equality_treats_nan_as_equal() {
        assert_eq!(ArgValue::Float(f64::NAN), ArgValue::Float(f64::NAN));
        assert_eq!(ArgValue::Float(0.0), ArgValue::Float(-0.0));
        assert_ne!(ArgValue::Float(f64::NAN), ArgValue::Float(1.0));
        assert_ne!(ArgValue::Float(1.0), ArgValue::Int(1));
        assert_eq!(
            ArgTuple::new([f64::NAN]).with_keyword("k", vec![f64::NAN]),
            ArgTuple::new([f64::NAN]).with_keyword("k", vec![f64::NAN])
        );
    }

    #[test]
    fn test_adapt_positional_drops_extra_and_keywords() {
        let args = ArgTuple::new([1, 2, 3]).with_keyword("k", true);
        let adapted = args.adapt(Arity::Positional(1));
        assert_eq!(adapted.positional(), &[ArgValue::Int(1)]);
        assert!(adapted.keywords().is_empty());
    }

    #[test]
    fn test_adapt_borrows_when_nothing_is_dropped() {
        let args = ArgTuple::new([1, 2]);
        assert!(matches!(args.adapt(Arity::Positional(5)), Cow::Borrowed(_)));
        assert!(matches!(args.adapt(Arity::Variadic), Cow::Borrowed(_)));
        assert!(matches!(args.adapt(Arity::Nullary), Cow::Owned(_)));
        assert!(matches!(ArgTuple::empty().adapt(Arity::Nullary), Cow::Borrowed(_)));
    }

    #[test]
    fn test_typed_accessors() {
        let args = ArgTuple::new(vec![ArgValue::from(7), ArgValue::from("x")]);
        assert_eq!(args.int(0).unwrap(), 7);
        assert_eq!(args.float(0).unwrap(), 7.0);
        assert_eq!(args.string(1).unwrap(), "x");

        match args.int(1) {
            Err(SingletonError::InvalidArgument(msg)) => {
                assert!(msg.contains("must be int"));
                assert!(msg.contains("'x'"));
            }
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
        assert!(matches!(args.int(5), Err(SingletonError::InvalidArgument(_))));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(ArgTuple::from(()), ArgTuple::empty());
        assert_eq!(ArgTuple::from([1, 2]), ArgTuple::new([1, 2]));
        let collected: ArgTuple = (0..3).collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(ArgValue::from(None::<i32>), ArgValue::Null);
        assert_eq!(ArgValue::from(Some("s")), ArgValue::Str("s".to_string()));
    }
}
