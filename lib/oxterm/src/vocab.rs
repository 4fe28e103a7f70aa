//! Provides IRIs of commonly used vocabularies.
//!
//! The constants are plain `&str` so they can be compared directly with [`NamedNode`](crate::NamedNode)
//! and passed to [`NamedNode::new_unchecked`](crate::NamedNode::new_unchecked).

pub mod rdf {
    //! [RDF](https://www.w3.org/TR/rdf11-concepts/) vocabulary.

    /// The class of language-tagged string literal values.
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
    /// The subject is an instance of a class.
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

pub mod xsd {
    //! [RDF compatible XSD datatypes](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-compatible-xsd-types).

    /// true, false.
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    /// 128…+127 (8 bit).
    pub const BYTE: &str = "http://www.w3.org/2001/XMLSchema#byte";
    /// Dates (yyyy-mm-dd) with or without timezone.
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    /// Date and time with or without timezone.
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    /// Date and time with required timezone.
    pub const DATE_TIME_STAMP: &str = "http://www.w3.org/2001/XMLSchema#dateTimeStamp";
    /// Arbitrary-precision decimal numbers.
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    /// 64-bit floating point numbers incl. ±Inf, ±0, NaN.
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    /// 32-bit floating point numbers incl. ±Inf, ±0, NaN.
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    /// Gregorian calendar day of the month.
    pub const G_DAY: &str = "http://www.w3.org/2001/XMLSchema#gDay";
    /// Gregorian calendar month.
    pub const G_MONTH: &str = "http://www.w3.org/2001/XMLSchema#gMonth";
    /// Gregorian calendar month and day.
    pub const G_MONTH_DAY: &str = "http://www.w3.org/2001/XMLSchema#gMonthDay";
    /// Gregorian calendar year.
    pub const G_YEAR: &str = "http://www.w3.org/2001/XMLSchema#gYear";
    /// Gregorian calendar year and month.
    pub const G_YEAR_MONTH: &str = "http://www.w3.org/2001/XMLSchema#gYearMonth";
    /// -2147483648…+2147483647 (32 bit).
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    /// Arbitrary-size integer numbers.
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    /// -9223372036854775808…+9223372036854775807 (64 bit).
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    /// Integer numbers <0.
    pub const NEGATIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#negativeInteger";
    /// Integer numbers ≥0.
    pub const NON_NEGATIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonNegativeInteger";
    /// Integer numbers ≤0.
    pub const NON_POSITIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonPositiveInteger";
    /// Integer numbers >0.
    pub const POSITIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#positiveInteger";
    /// -32768…+32767 (16 bit).
    pub const SHORT: &str = "http://www.w3.org/2001/XMLSchema#short";
    /// Character strings (but not all Unicode character strings).
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    /// Times (hh:mm:ss.sss…) with or without timezone.
    pub const TIME: &str = "http://www.w3.org/2001/XMLSchema#time";
    /// 0…255 (8 bit).
    pub const UNSIGNED_BYTE: &str = "http://www.w3.org/2001/XMLSchema#unsignedByte";
    /// 0…4294967295 (32 bit).
    pub const UNSIGNED_INT: &str = "http://www.w3.org/2001/XMLSchema#unsignedInt";
    /// 0…18446744073709551615 (64 bit).
    pub const UNSIGNED_LONG: &str = "http://www.w3.org/2001/XMLSchema#unsignedLong";
    /// 0…65535 (16 bit).
    pub const UNSIGNED_SHORT: &str = "http://www.w3.org/2001/XMLSchema#unsignedShort";
}
