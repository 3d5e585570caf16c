//! Identity types for Pantry entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PantryError;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw database key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

define_id!(
    /// Account identifier issued by the external auth provider.
    UserId
);
define_id!(
    /// Recipe primary key.
    RecipeId
);
define_id!(
    /// Ingredient primary key.
    IngredientId
);
define_id!(
    /// Tag primary key.
    TagId
);

/// Who is making a request.
///
/// Resolved by the HTTP layer from request credentials. Operations that need
/// an owner call [`Caller::require_user`] and fail with
/// [`PantryError::Unauthorized`] for anonymous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    User(UserId),
}

impl Caller {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Caller::User(id) => Some(*id),
            Caller::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::User(_))
    }

    /// The authenticated user, or `Unauthorized`.
    pub fn require_user(&self) -> Result<UserId, PantryError> {
        self.user_id().ok_or(PantryError::Unauthorized)
    }
}

impl From<UserId> for Caller {
    fn from(id: UserId) -> Self {
        Caller::User(id)
    }
}
