use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is its own type so an `OrderId` can never be passed where
/// an `EventId` is expected.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Declares an opaque string identifier newtype.
///
/// Used for identifiers minted outside this system (seat codes from the venue
/// map, checkout sessions from the browser, users from the auth provider).
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty or whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of a purchase order.
    OrderId
);
uuid_id!(
    /// Identifier of a single payment attempt.
    PaymentId
);
uuid_id!(
    /// Identifier of an issued ticket.
    TicketId
);
uuid_id!(
    /// Identifier of a ticketed event (concert, match, play).
    EventId
);
uuid_id!(
    /// Identifier of a venue section.
    SectionId
);
uuid_id!(
    /// Identifier of a non-seated ticket category.
    TicketTypeId
);
uuid_id!(
    /// Identifier of a promotional code.
    PromoCodeId
);

string_id!(
    /// Identifier of a seat on a venue map, e.g. `"A-12"`.
    SeatId
);
string_id!(
    /// Identifier of the user as issued by the authentication provider.
    UserId
);
string_id!(
    /// Identifier grouping the seats held by one browser checkout.
    SessionId
);

impl SessionId {
    /// Generates a fresh random session identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_new_creates_unique_ids() {
        assert_ne!(OrderId::new(), OrderId::new());
    }

    #[test]
    fn event_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(EventId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn seat_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SeatId::new("A-12")).unwrap();
        assert_eq!(json, "\"A-12\"");
    }

    #[test]
    fn blank_identifiers_are_detected() {
        assert!(SessionId::new("   ").is_blank());
        assert!(!SessionId::new("s1").is_blank());
    }

    #[test]
    fn generated_sessions_differ() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }
}
