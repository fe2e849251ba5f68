use serde::{Deserialize, Serialize};

use crate::model::User;

/// A blog post. The author is optional so anonymous drafts can be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: Option<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_author_serializes_as_null() {
        let post = Post {
            id: "p1".into(),
            title: "Hello".into(),
            content: "First post".into(),
            author: None,
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["author"], serde_json::Value::Null);
        assert_eq!(value["title"], "Hello");
    }

    #[test]
    fn author_is_embedded() {
        let json = r#"{"id":"p2","title":"t","content":"c","author":{"id":"2","name":"Mary","age":30}}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.author, Some(User::new("2", "Mary", 30)));
    }
}
