//! The closed set of measurement value types and where each is stored.

use std::fmt::Display;

use serde::Serialize;
use strum::EnumIter;

/// Physical location of a measurement value.
///
/// Integer and real values live inline on the `measurement` row; text and
/// datetime values live in a dedicated table keyed by the measurement id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumIter, Serialize)]
pub enum Slot {
    /// `measurement.valinteger`
    Integer,
    /// `measurement.valreal`
    Real,
    /// `textvalue.textval`
    Text,
    /// `datetimevalue.datetimeval`
    DateTime,
}
impl Slot {
    /// Table holding values stored in this slot.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Integer | Self::Real => "measurement",
            Self::Text => "textvalue",
            Self::DateTime => "datetimevalue",
        }
    }

    /// Column holding values stored in this slot.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Integer => "valinteger",
            Self::Real => "valreal",
            Self::Text => "textval",
            Self::DateTime => "datetimeval",
        }
    }

    /// `table.column`, ready to be used in a query.
    pub fn qualified_column(&self) -> &'static str {
        match self {
            Self::Integer => "measurement.valinteger",
            Self::Real => "measurement.valreal",
            Self::Text => "textvalue.textval",
            Self::DateTime => "datetimevalue.datetimeval",
        }
    }

    /// True when the value is written on the `measurement` row itself.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }
}

/// Closed set of value-type tags stored in `measurement.valtype`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, EnumIter, Serialize)]
pub enum ValueType {
    /// Tag 0.
    #[default]
    Integer,
    /// Tag 1.
    Real,
    /// Tag 2.
    Text,
    /// Tag 3.
    DateTime,
    /// Tag 4, stored as an integer restricted to 0 or 1.
    Boolean,
    /// Tag 5, a category code.
    Nominal,
    /// Tag 6, an ordered category code.
    Ordinal,
    /// Tag 7.
    BoundedInteger,
    /// Tag 8.
    BoundedReal,
    /// Tag 9.
    BoundedDateTime,
    /// Tag 10, free text referring to something held outside the warehouse.
    ExternalText,
}

impl ValueType {
    /// Resolves a stored tag, returning `None` for tags outside the enumeration.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Integer),
            1 => Some(Self::Real),
            2 => Some(Self::Text),
            3 => Some(Self::DateTime),
            4 => Some(Self::Boolean),
            5 => Some(Self::Nominal),
            6 => Some(Self::Ordinal),
            7 => Some(Self::BoundedInteger),
            8 => Some(Self::BoundedReal),
            9 => Some(Self::BoundedDateTime),
            10 => Some(Self::ExternalText),
            _ => None,
        }
    }

    /// The tag written to `measurement.valtype`.
    pub fn tag(&self) -> i64 {
        match self {
            Self::Integer => 0,
            Self::Real => 1,
            Self::Text => 2,
            Self::DateTime => 3,
            Self::Boolean => 4,
            Self::Nominal => 5,
            Self::Ordinal => 6,
            Self::BoundedInteger => 7,
            Self::BoundedReal => 8,
            Self::BoundedDateTime => 9,
            Self::ExternalText => 10,
        }
    }

    /// The slot that stores values of this type.
    pub fn slot(&self) -> Slot {
        match self {
            Self::Integer
            | Self::Boolean
            | Self::Nominal
            | Self::Ordinal
            | Self::BoundedInteger => Slot::Integer,
            Self::Real | Self::BoundedReal => Slot::Real,
            Self::Text | Self::ExternalText => Slot::Text,
            Self::DateTime | Self::BoundedDateTime => Slot::DateTime,
        }
    }

    /// True for types stored in `measurement.valinteger`.
    pub fn is_integer_slot(&self) -> bool {
        self.slot() == Slot::Integer
    }
    /// True for types stored in `measurement.valreal`.
    pub fn is_real_slot(&self) -> bool {
        self.slot() == Slot::Real
    }
    /// True for types stored in `textvalue`.
    pub fn is_text_slot(&self) -> bool {
        self.slot() == Slot::Text
    }
    /// True for types stored in `datetimevalue`.
    pub fn is_datetime_slot(&self) -> bool {
        self.slot() == Slot::DateTime
    }

    /// Lowercase name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::DateTime => "datetime",
            Self::Boolean => "boolean",
            Self::Nominal => "nominal",
            Self::Ordinal => "ordinal",
            Self::BoundedInteger => "bounded integer",
            Self::BoundedReal => "bounded real",
            Self::BoundedDateTime => "bounded datetime",
            Self::ExternalText => "external text",
        }
    }
}
impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tags_round_trip_and_stay_closed() {
        for value_type in ValueType::iter() {
            assert_eq!(ValueType::from_tag(value_type.tag()), Some(value_type));
        }
        assert_eq!(ValueType::iter().count(), 11);
        assert_eq!(ValueType::from_tag(-1), None);
        assert_eq!(ValueType::from_tag(11), None);
    }

    #[test]
    fn slot_predicates_partition_every_tag() {
        for value_type in ValueType::iter() {
            let hits = [
                value_type.is_integer_slot(),
                value_type.is_real_slot(),
                value_type.is_text_slot(),
                value_type.is_datetime_slot(),
            ]
            .into_iter()
            .filter(|hit| *hit)
            .count();
            assert_eq!(hits, 1, "{value_type} must map to exactly one slot");
        }
    }

    #[test]
    fn boolean_shares_the_integer_column() {
        assert_eq!(
            ValueType::Boolean.slot().qualified_column(),
            "measurement.valinteger"
        );
        assert_eq!(ValueType::ExternalText.slot().table(), "textvalue");
        assert_eq!(ValueType::BoundedDateTime.slot().column(), "datetimeval");
    }
}
