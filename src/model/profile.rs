use serde::{Deserialize, Serialize};

use crate::store::typed::Document;

use super::PROFILES;

/// Created on first sign-in, edited only by its owner, never deleted. The document id is the
/// owner's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl Profile {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: uid.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: email.into(),
            photo_url: None,
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

impl Document for Profile {
    const COLLECTION: &'static str = PROFILES;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Profile;

    #[test]
    fn persisted_shape() {
        let mut profile = Profile::new("uid-1", "ada@example.com");
        profile.first_name = "Ada".into();
        profile.photo_url = Some("https://example.com/ada.png".into());

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({
                "firstName": "Ada",
                "lastName": "",
                "email": "ada@example.com",
                "photoURL": "https://example.com/ada.png",
            })
        );
        assert_eq!(profile.display_name(), "Ada");
        assert_eq!(Profile::new("uid-2", "x@y.z").display_name(), "x@y.z");
    }
}
