use serde::{Deserialize, Serialize};

/// A registered blog user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub age: u32,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, age: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
        }
    }
}

/// The static user table served by `/get-users`.
pub fn users() -> Vec<User> {
    vec![
        User::new("1", "John", 20),
        User::new("2", "Mary", 30),
        User::new("3", "Mike", 40),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_table_is_fixed() {
        let ids: Vec<_> = users().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn serializes_with_lowercase_fields() {
        let json = serde_json::to_string(&users()[0]).unwrap();
        assert_eq!(json, r#"{"id":"1","name":"John","age":20}"#);
    }
}
