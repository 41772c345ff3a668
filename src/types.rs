//! The sliver of a type system the extern analyzer needs: classifying a
//! declared return type as disjoint-from-object or not.

/// A declared type, collapsed to the granularity the purity analysis cares
/// about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsType {
    /// The empty (bottom) type.
    Empty,
    /// Primitives: immutable and identity-less.
    Primitive,
    /// Anything that may be (or contain) an object.
    Object,
    /// No usable information.
    Unknown,
}

const PRIMITIVE_NAMES: &[&str] = &[
    "number",
    "string",
    "boolean",
    "symbol",
    "bigint",
    "undefined",
    "null",
    "void",
];

impl JsType {
    /// Interprets a JSDoc type annotation payload, e.g. `number`,
    /// `?Foo`, `string|undefined`.
    pub fn from_annotation(text: &str) -> JsType {
        let text = text.trim();
        if text == "?" || text == "*" {
            return JsType::Unknown;
        }
        let mut saw_object = false;
        for part in text.split('|') {
            let part = part
                .trim()
                .trim_start_matches('!')
                .trim_start_matches('?')
                .trim_end_matches('=');
            if part.is_empty() || part == "?" || part == "*" {
                return JsType::Unknown;
            }
            if !PRIMITIVE_NAMES.contains(&part) {
                saw_object = true;
            }
        }
        if saw_object {
            JsType::Object
        } else {
            JsType::Primitive
        }
    }

    pub fn is_empty(self) -> bool {
        self == JsType::Empty
    }
}

/// Greatest lower bound of two types in the collapsed lattice.
pub fn meet(a: JsType, b: JsType) -> JsType {
    use JsType::*;
    match (a, b) {
        (Empty, _) | (_, Empty) => Empty,
        (Unknown, other) | (other, Unknown) => other,
        (Primitive, Primitive) => Primitive,
        (Object, Object) => Object,
        (Primitive, Object) | (Object, Primitive) => Empty,
    }
}

/// Whether a value of declared type `t` is guaranteed to be a local value.
///
/// Only immutable, identity-less values can never contribute to side
/// effects, so this holds exactly when `t` is disjoint from the root object
/// type.
pub fn is_local_value_type(t: JsType) -> bool {
    meet(t, JsType::Object).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_classification() {
        assert_eq!(JsType::from_annotation("number"), JsType::Primitive);
        assert_eq!(
            JsType::from_annotation("string|undefined"),
            JsType::Primitive
        );
        assert_eq!(JsType::from_annotation("!Object"), JsType::Object);
        assert_eq!(JsType::from_annotation("?Foo"), JsType::Object);
        assert_eq!(JsType::from_annotation("number|Array"), JsType::Object);
        assert_eq!(JsType::from_annotation("*"), JsType::Unknown);
    }

    #[test]
    fn locality() {
        assert!(is_local_value_type(JsType::Primitive));
        assert!(!is_local_value_type(JsType::Object));
        assert!(!is_local_value_type(JsType::Unknown));
    }
}
