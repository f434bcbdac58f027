//! Stores plain structs under integer keys and reads them back, with and
//! without transforms.
//!
//! Run with: cargo run --example user_types

use sovran_anystore::{AnyStore, StoreError};

#[derive(Debug, Clone)]
struct FullName {
    first_name: String,
    last_name: String,
}

#[derive(Debug, Clone, PartialEq)]
struct SomeStructure {
    a: i32,
    b: i32,
    c: String,
}

fn main() -> Result<(), StoreError> {
    let store = AnyStore::<i32>::new();

    store.insert_or_assign(1, "foo".to_string())?;
    println!("1 => {}", store.get_as::<String>(&1)?);

    match store.get_as::<i32>(&1) {
        Ok(value) => println!("Unexpected: 1 read back as {}", value),
        Err(e) => println!("Reading 1 as i32 fails: {}", e),
    }

    store.insert_or_assign(1, "bar".to_string())?;
    println!("1 => {} after re-assign", store.get_as::<String>(&1)?);

    store.insert_or_assign(
        2,
        FullName {
            first_name: "John".to_string(),
            last_name: "Silver".to_string(),
        },
    )?;
    store.with(&2, |name: &FullName| {
        println!("2 => {} {}", name.first_name, name.last_name);
    })?;

    store.insert_or_assign(
        22,
        SomeStructure {
            a: 1,
            b: 2,
            c: "3".to_string(),
        },
    )?;
    println!("22 => {:?}", store.get_as::<SomeStructure>(&22)?);

    // Transform on the way in
    store.insert_or_assign_with(3, 123, |n: i32| n.to_string())?;
    store.insert_or_assign_with(4, "abc".to_string(), |s: String| s + ".")?;

    // Transform on the way out; the stored values stay as they are
    let add_dot = |s: &String| format!("{}.", s);
    println!("3 => {} (stored {})", store.get_and_apply(&3, add_dot)?, store.get_as::<String>(&3)?);
    println!("4 => {} (stored {})", store.get_and_apply(&4, add_dot)?, store.get_as::<String>(&4)?);

    let last_name = store.get_and_apply(&2, |name: &FullName| name.last_name.clone())?;
    println!("Last name of 2: {}", last_name);

    match store.get_as::<String>(&99) {
        Err(StoreError::KeyNotFound(key)) => println!("Key {} doesn't exist", key),
        other => println!("Unexpected: {:?}", other),
    }

    Ok(())
}
