use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// A vector guaranteed to hold at least one element.
///
/// Used wherever Presentation Exchange requires a non-empty array, e.g. the
/// `path` of a constraints field or the children of a `from_nested`
/// submission requirement. No `Default`: the vector is never empty.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

/// Returned when converting an empty [Vec] into a [NonEmptyVec].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected at least one element, found an empty array")]
pub struct EmptyVecError;

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(t: T) -> Self {
        Self(vec![t])
    }

    pub fn maybe_new(v: Vec<T>) -> Option<Self> {
        Self::try_from(v).ok()
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }

    /// The first element, which always exists.
    pub fn head(&self) -> &T {
        &self.0[0]
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = EmptyVecError;

    fn try_from(v: Vec<T>) -> Result<NonEmptyVec<T>, EmptyVecError> {
        if v.is_empty() {
            return Err(EmptyVecError);
        }
        Ok(NonEmptyVec(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Vec<T> {
        v
    }
}

impl<T: Clone> AsRef<[T]> for NonEmptyVec<T> {
    fn as_ref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<'a, T: Clone> IntoIterator for &'a NonEmptyVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Turn a claim name into a label a wallet can show to the user.
///
/// Both camelCase and snake_case are split into words and each word is
/// capitalized, e.g. `dateOfBirth` becomes `Date Of Birth` and
/// `family_name` becomes `Family Name`.
pub fn to_human_readable_string(value: impl AsRef<str>) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in value.as_ref().chars() {
        if c == '_' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_vec_rejects_empty() {
        assert!(NonEmptyVec::<u8>::try_from(vec![]).is_err());
        assert!(serde_json::from_str::<NonEmptyVec<String>>("[]").is_err());

        let v: NonEmptyVec<String> = serde_json::from_str(r#"["$.type"]"#).unwrap();
        assert_eq!(v.head(), "$.type");
    }

    #[test]
    fn test_human_readable() {
        assert_eq!(to_human_readable_string("dateOfBirth"), "Date Of Birth");
        assert_eq!(to_human_readable_string("family_name"), "Family Name");
        assert_eq!(to_human_readable_string("id"), "Id");
    }
}
