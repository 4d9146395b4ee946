//! Entity identity keys.

use std::fmt;

use entigate_proto::{Row, Value};

use crate::error::{Error, Result};

const KEY_SEPARATOR: char = ':';

/// Ordered identity attribute values of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(Vec<String>);

impl EntityKey {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// Key of a single-part identity.
    pub fn single(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    /// Parse the `a:b` form produced by `Display`.
    pub fn parse(s: &str) -> Self {
        Self(s.split(KEY_SEPARATOR).map(str::to_string).collect())
    }

    /// Read the key from the first `width` columns of `row`.
    pub fn from_row(row: &Row, width: usize) -> Result<Self> {
        Self::from_row_range(row, 0, width)
    }

    /// Read the key from columns `offset..offset + width` of `row`.
    pub fn from_row_range(row: &Row, offset: usize, width: usize) -> Result<Self> {
        (offset..offset + width)
            .map(|i| {
                row.column(i).map(key_part).ok_or_else(|| {
                    Error::Backend(format!(
                        "row has {} columns, expected identity column {}",
                        row.columns.len(),
                        i
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn key_part(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", KEY_SEPARATOR)?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let key = EntityKey::new(vec!["svc".into(), "api-1".into()]);
        assert_eq!(key.to_string(), "svc:api-1");
        assert_eq!(EntityKey::parse("svc:api-1"), key);
    }

    #[test]
    fn test_from_row() {
        let row = Row::new(vec![Value::from("a"), Value::Long(7), Value::from("x")]);
        assert_eq!(
            EntityKey::from_row(&row, 2).unwrap(),
            EntityKey::new(vec!["a".into(), "7".into()])
        );
        assert_eq!(EntityKey::from_row_range(&row, 2, 1).unwrap(), EntityKey::single("x"));
        assert!(EntityKey::from_row(&row, 4).is_err());
    }
}
