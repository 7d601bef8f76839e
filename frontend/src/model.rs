use serde::{Deserialize, Deserializer};

/// A post as stored by the backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Post {
    /// The image url, if the post has a non-empty one.
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn fields(&self) -> PostFields {
        PostFields {
            title: self.title.clone(),
            content: self.content.clone(),
            image_url: self.image_url.clone().unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub post_id: String,
    pub comment: String,
}

/// Body of the create and update post requests, and the contents of the
/// create/edit form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostFields {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: String,
}

impl PostFields {
    pub fn new(title: &str, content: &str, image_url: &str) -> Self {
        PostFields {
            title: title.to_owned(),
            content: content.to_owned(),
            image_url: image_url.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(deserialize_with = "string_or_number")]
    pub post_id: String,
    pub comment: String,
}

// json-server style backends hand out numeric ids; they are kept as strings
// so that `data-id` attributes compare equal to them.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Str(id) => id,
        RawId::Num(id) => id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_uses_camel_case_and_optional_image() {
        let post: Post =
            serde_json::from_str(r#"{"id":"1","title":"A","content":"x","imageUrl":"a.png"}"#)
                .unwrap();
        assert_eq!(post.image(), Some("a.png"));

        let post: Post = serde_json::from_str(r#"{"id":"2","title":"B","content":"y"}"#).unwrap();
        assert_eq!(post.image_url, None);

        let post: Post =
            serde_json::from_str(r#"{"id":"3","title":"C","content":"z","imageUrl":""}"#).unwrap();
        assert_eq!(post.image(), None);
    }

    #[test]
    fn numeric_ids_become_strings() {
        let comment: Comment =
            serde_json::from_str(r#"{"id":7,"postId":12,"comment":"hi"}"#).unwrap();
        assert_eq!(comment.id, "7");
        assert_eq!(comment.post_id, "12");
    }

    #[test]
    fn fields_serialize_image_url_even_when_empty() {
        let body = serde_json::to_value(PostFields::new("t", "c", "")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"title": "t", "content": "c", "imageUrl": ""})
        );
    }
}
