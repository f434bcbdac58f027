use crate::error::StoreError;
use crate::type_tag::TypeTag;
use std::any::{type_name, Any};
use std::fmt;

/// A container for one type-erased value that preserves its type information.
///
/// An `AnyValue` is never modified after construction; assigning a key in the
/// store replaces the whole container.
pub struct AnyValue {
    tag: TypeTag,
    value: Box<dyn Any + Send + Sync>,
}

impl AnyValue {
    /// Create a new AnyValue from any cloneable, thread-safe value
    pub fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            value: Box::new(value),
        }
    }

    /// The tag of the contained value's concrete type
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Check if the contained value is of type T
    pub fn is_type<T: 'static>(&self) -> bool {
        self.tag == TypeTag::of::<T>()
    }

    /// Borrow the contained value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TypeMismatch` if the value is not exactly a `T`.
    pub fn cast<T: 'static>(&self) -> Result<&T, StoreError> {
        let mismatch = || StoreError::TypeMismatch {
            expected: type_name::<T>(),
            found: self.tag.name(),
        };
        if !self.is_type::<T>() {
            return Err(mismatch());
        }
        self.value.downcast_ref::<T>().ok_or_else(mismatch)
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyValue")
            .field("type", &self.tag)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct SomeStructure {
        a: i32,
        b: i32,
        c: String,
    }

    #[test]
    fn test_cast_to_stored_type() {
        let value = AnyValue::new(SomeStructure {
            a: 1,
            b: 2,
            c: "3".to_string(),
        });

        let inner = value.cast::<SomeStructure>().unwrap();
        assert_eq!(inner.a, 1);
        assert_eq!(inner.b, 2);
        assert_eq!(inner.c, "3");
    }

    #[test]
    fn test_cast_never_coerces() {
        let value = AnyValue::new(42i32);

        assert!(value.is_type::<i32>());
        assert!(!value.is_type::<i64>());

        match value.cast::<i64>() {
            Err(StoreError::TypeMismatch { expected, found }) => {
                assert_eq!(expected, "i64");
                assert_eq!(found, "i32");
            }
            other => panic!("expected a type mismatch, got {:?}", other),
        }
        assert!(value.cast::<u32>().is_err());
    }

    #[test]
    fn test_cast_borrows_in_place() {
        let value = AnyValue::new(vec![1u8; 1024]);
        let first = value.cast::<Vec<u8>>().unwrap() as *const Vec<u8>;
        let second = value.cast::<Vec<u8>>().unwrap() as *const Vec<u8>;
        assert_eq!(first, second);
    }

    #[test]
    fn test_type_tag_and_debug() {
        let value = AnyValue::new("hello".to_string());
        assert_eq!(value.type_tag(), TypeTag::of::<String>());
        assert!(format!("{:?}", value).contains("String"));
    }
}
