use serde::{Deserialize, Serialize};

/// Declares a database-backed identifier newtype.
///
/// Identifiers wrap the `BIGINT` primary key assigned by the store, which keeps
/// user, product, order and address ids from being mixed up at call sites.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw key.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user account.
    UserId
);

define_id!(
    /// Unique identifier for a catalog product.
    ///
    /// Ordering follows the raw key; inventory demand relies on it for a
    /// deterministic check, mutation and lock order.
    ProductId
);

define_id!(
    /// Unique identifier for a persisted order.
    OrderId
);

define_id!(
    /// Unique identifier for a saved address.
    AddressId
);
