use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Process-wide identifier of a concrete stored type.
///
/// Two tags compare equal iff they were produced for the same type. The type
/// name is carried along for error messages only and takes no part in
/// equality or hashing.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Returns the tag for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Human-readable name of the tagged type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct FullName;

    #[test]
    fn test_same_type_same_tag() {
        assert_eq!(TypeTag::of::<String>(), TypeTag::of::<String>());
        assert_eq!(TypeTag::of::<FullName>(), TypeTag::of::<FullName>());
    }

    #[test]
    fn test_distinct_types_distinct_tags() {
        let tags: HashSet<TypeTag> = [
            TypeTag::of::<i32>(),
            TypeTag::of::<i64>(),
            TypeTag::of::<u32>(),
            TypeTag::of::<String>(),
            TypeTag::of::<&'static str>(),
            TypeTag::of::<FullName>(),
        ]
        .into_iter()
        .collect();
        assert_eq!(tags.len(), 6);
    }

    #[test]
    fn test_type_id_matches_std() {
        assert_eq!(TypeTag::of::<String>().type_id(), TypeId::of::<String>());
        assert_eq!(TypeTag::of::<FullName>().type_id(), TypeId::of::<FullName>());
        assert_ne!(TypeTag::of::<i32>().type_id(), TypeId::of::<u32>());
    }

    #[test]
    fn test_display_uses_type_name() {
        assert_eq!(TypeTag::of::<i32>().to_string(), "i32");
        assert!(format!("{:?}", TypeTag::of::<String>()).contains("String"));
    }
}
