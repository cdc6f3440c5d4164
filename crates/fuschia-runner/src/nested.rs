//! Expansion of dotted input ids into nested maps.

use std::collections::btree_map::Entry;

use fuschia_flow::{TypedValue, TypedValueMap};

use crate::error::RunnerError;

/// Build a map where `a.b` lands at `{"a": {"b": ...}}`.
///
/// Fails with [`RunnerError::ConflictingKey`] when one id is a prefix of
/// another (`a` and `a.b`) or the same id appears twice.
pub fn nest<I>(entries: I) -> Result<TypedValueMap, RunnerError>
where
  I: IntoIterator<Item = (String, TypedValue)>,
{
  let mut tree = TypedValueMap::new();
  for (key, value) in entries {
    let segments: Vec<&str> = key.split('.').collect();
    insert(&mut tree, &key, &segments, value)?;
  }
  Ok(tree)
}

fn insert(
  tree: &mut TypedValueMap,
  key: &str,
  segments: &[&str],
  value: TypedValue,
) -> Result<(), RunnerError> {
  let conflict = || RunnerError::ConflictingKey {
    key: key.to_string(),
  };

  match segments {
    [] => Err(conflict()),
    [leaf] => match tree.entry(leaf.to_string()) {
      Entry::Vacant(slot) => {
        slot.insert(value);
        Ok(())
      }
      Entry::Occupied(_) => Err(conflict()),
    },
    [head, rest @ ..] => match tree
      .entry(head.to_string())
      .or_insert_with(|| TypedValue::Map(TypedValueMap::new()))
    {
      TypedValue::Map(child) => insert(child, key, rest, value),
      _ => Err(conflict()),
    },
  }
}
