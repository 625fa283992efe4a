use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const USER_NAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthorMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Author {
    pub id: Id<AuthorMarker>,
    pub first_name: String,
    pub last_name: String,
    pub user_name: UserName,
}

impl Author {
    /// `"first last"`, without surrounding whitespace.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    #[must_use]
    pub fn serialize(&self) -> SerializedAuthor {
        SerializedAuthor {
            id: self.id,
            name: self.display_name(),
            user_name: self.user_name.clone(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAuthor {
    pub id: Id<AuthorMarker>,
    pub name: String,
    pub user_name: UserName,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthor {
    pub first_name: String,
    pub last_name: String,
    pub user_name: UserName,
}

/// Only the fields that are `Some` are changed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_name: Option<UserName>,
}

impl UpdateAuthor {
    pub fn apply(&self, author: &mut Author) {
        if let Some(first_name) = &self.first_name {
            author.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &self.last_name {
            author.last_name.clone_from(last_name);
        }
        if let Some(user_name) = &self.user_name {
            author.user_name.clone_from(user_name);
        }
    }
}

/// Unique, case sensitive login name of an author.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user name is invalid: {0:?}")]
pub struct InvalidUserNameError(String);

impl UserName {
    pub fn new(user_name: String) -> Result<Self, InvalidUserNameError> {
        let len = user_name.chars().count();
        if len > 0 && len <= USER_NAME_MAX_LEN {
            Ok(UserName(user_name))
        } else {
            Err(InvalidUserNameError(user_name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for UserName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserName::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"a user name"))
    }
}
