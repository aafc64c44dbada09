//! Value tests: typed comparisons against measurement values and the SQL
//! fragments that apply them.

use std::{fmt::Display, str::FromStr};

use thiserror::Error;
use warehouse_core::{
    parsers::{format_timestamp, parse_timestamp},
    Id, Slot, ValueType,
};

use crate::{data::Value, executor::SqlValue, filter::Fragment, WarehouseError, WarehouseResult};

/// Comparison operator used in value tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}
impl Operator {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}
impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// A comparison against a measurement value, e.g. `> 3`.
///
/// The operand is always bound as a parameter, never spliced into the SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    operator: Operator,
    operand: Value,
}

impl Comparison {
    /// Compares against `operand` with `operator`.
    pub fn new(operator: Operator, operand: impl Into<Value>) -> Self {
        Self {
            operator,
            operand: operand.into(),
        }
    }
    /// The comparison operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }
    /// The value compared against.
    pub fn operand(&self) -> &Value {
        &self.operand
    }
}
impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.operator, self.operand)
    }
}

/// Errors raised while parsing a textual comparison.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseComparisonError {
    /// No comparison operator in front of the operand.
    #[error("comparison \"{0}\" does not start with an operator")]
    MissingOperator(String),
    /// Nothing follows the operator.
    #[error("comparison \"{0}\" has no operand")]
    MissingOperand(String),
    /// The operand is not a number, boolean or quoted string.
    #[error("cannot read operand \"{0}\"")]
    InvalidOperand(String),
    /// A value test without a measurement type prefix.
    #[error("value test \"{0}\" must look like <measurement type>:<comparison>")]
    InvalidValueTest(String),
}

// Two-character operators come first so that ">=" is not read as ">".
const OPERATORS: &[(&str, Operator)] = &[
    (">=", Operator::Ge),
    ("<=", Operator::Le),
    ("!=", Operator::Ne),
    ("<>", Operator::Ne),
    ("==", Operator::Eq),
    ("=", Operator::Eq),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

impl FromStr for Comparison {
    type Err = ParseComparisonError;

    /// Reads the textual form used by existing callers: an operator followed
    /// by an integer, a real, `true`/`false`, or a single-quoted string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (operator, rest) = OPERATORS
            .iter()
            .find_map(|(token, op)| trimmed.strip_prefix(token).map(|rest| (*op, rest)))
            .ok_or_else(|| ParseComparisonError::MissingOperator(s.to_string()))?;
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ParseComparisonError::MissingOperand(s.to_string()));
        }
        let operand = if let Some(inner) = rest
            .strip_prefix('\'')
            .and_then(|r| r.strip_suffix('\''))
        {
            Value::Text(inner.replace("''", "'"))
        } else if let Ok(v) = rest.parse::<i64>() {
            Value::Int(v)
        } else if let Ok(v) = rest.parse::<f64>() {
            Value::Real(v)
        } else if rest.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if rest.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else {
            return Err(ParseComparisonError::InvalidOperand(rest.to_string()));
        };
        Ok(Self { operator, operand })
    }
}

/// A value-level condition on the members of one measurement type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTest {
    /// Measurement type whose members are tested.
    pub measurement_type: Id,
    /// Comparison every member of that type must satisfy.
    pub comparison: Comparison,
}
impl ValueTest {
    /// Tests members of `measurement_type` with `comparison`.
    pub fn new(measurement_type: Id, comparison: Comparison) -> Self {
        Self {
            measurement_type,
            comparison,
        }
    }
}
impl FromStr for ValueTest {
    type Err = ParseComparisonError;

    /// Reads `<measurement type>:<comparison>`, e.g. `12:> 3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (measurement_type, comparison) = s
            .split_once(':')
            .ok_or_else(|| ParseComparisonError::InvalidValueTest(s.to_string()))?;
        let measurement_type = measurement_type
            .trim()
            .parse::<Id>()
            .map_err(|_| ParseComparisonError::InvalidValueTest(s.to_string()))?;
        Ok(Self::new(measurement_type, comparison.parse()?))
    }
}

/// Begins constructing a value test against the given measurement type.
pub fn value_test(measurement_type: Id) -> ValueTestField {
    ValueTestField { measurement_type }
}

/// Builder used to create value tests.
#[derive(Clone, Copy)]
pub struct ValueTestField {
    measurement_type: Id,
}
impl ValueTestField {
    fn test(self, operator: Operator, operand: impl Into<Value>) -> ValueTest {
        ValueTest::new(self.measurement_type, Comparison::new(operator, operand))
    }
    /// Matches values equal to `value`.
    pub fn eq(self, value: impl Into<Value>) -> ValueTest {
        self.test(Operator::Eq, value)
    }
    /// Matches values not equal to `value`.
    pub fn neq(self, value: impl Into<Value>) -> ValueTest {
        self.test(Operator::Ne, value)
    }
    /// Matches values strictly greater than `value`.
    pub fn gt(self, value: impl Into<Value>) -> ValueTest {
        self.test(Operator::Gt, value)
    }
    /// Matches values greater than or equal to `value`.
    pub fn geq(self, value: impl Into<Value>) -> ValueTest {
        self.test(Operator::Ge, value)
    }
    /// Matches values strictly less than `value`.
    pub fn lt(self, value: impl Into<Value>) -> ValueTest {
        self.test(Operator::Lt, value)
    }
    /// Matches values less than or equal to `value`.
    pub fn leq(self, value: impl Into<Value>) -> ValueTest {
        self.test(Operator::Le, value)
    }
}

/// A value test whose measurement type has been resolved to its value type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValueTest {
    /// Measurement type whose members are tested.
    pub measurement_type: Id,
    /// Value type of that measurement type.
    pub value_type: ValueType,
    /// Comparison every member must satisfy.
    pub comparison: Comparison,
}

fn bind_operand(value_type: ValueType, operand: &Value) -> WarehouseResult<SqlValue> {
    let mismatch = || WarehouseError::ValueMismatch {
        value_type,
        value: operand.to_string(),
    };
    match (value_type.slot(), operand) {
        (Slot::Integer | Slot::Real, Value::Int(_) | Value::Real(_) | Value::Bool(_))
        | (Slot::Text, Value::Text(_))
        | (Slot::DateTime, Value::Time(_)) => Ok(operand.to_sql_value()),
        (Slot::DateTime, Value::Text(v)) => {
            let parsed = parse_timestamp(v).map_err(|_| mismatch())?;
            Ok(SqlValue::Text(format_timestamp(&parsed)))
        }
        _ => Err(mismatch()),
    }
}

/// Renders `(<slot column> <op> ?)` for a value of type `value_type`.
pub fn build_value_test(value_type: ValueType, comparison: &Comparison) -> WarehouseResult<Fragment> {
    let param = bind_operand(value_type, &comparison.operand)?;
    Ok(Fragment::new(
        format!(
            "({} {} ?)",
            value_type.slot().qualified_column(),
            comparison.operator.as_sql()
        ),
        vec![param],
    ))
}

/// Renders a clause that holds for a measurement violating any of `tests`:
/// `((measurement.measurementtype = ?) AND NOT (slot op ?)) OR …`.
pub fn build_failed_conditions_filter(tests: &[ResolvedValueTest]) -> WarehouseResult<Fragment> {
    let mut rendered = Vec::with_capacity(tests.len());
    let mut params = Vec::with_capacity(tests.len() * 2);
    for test in tests {
        let value_test = build_value_test(test.value_type, &test.comparison)?;
        rendered.push(format!(
            "((measurement.measurementtype = ?) AND NOT {})",
            value_test.sql
        ));
        params.push(SqlValue::Integer(test.measurement_type));
        params.extend(value_test.params);
    }
    if rendered.is_empty() {
        return Ok(Fragment::new("1 = 0", Vec::new()));
    }
    Ok(Fragment::new(rendered.join(" OR "), params))
}
