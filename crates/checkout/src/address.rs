//! Resolves checkout address selectors to the text stored on an order.

use common::UserId;
use domain::{AddressPurpose, AddressSelector, NewAddress, PostalAddress};
use store::{AddressStore, StoreError};

use crate::error::{CheckoutError, Result};

/// An address ready to be written onto an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Single-line form stored on the order.
    pub formatted: String,
    /// Inline address the user asked to keep, saved once the order exists.
    pub save: Option<PostalAddress>,
}

/// Looks up and remembers user addresses.
#[derive(Clone)]
pub struct AddressResolver<A: AddressStore> {
    store: A,
}

impl<A: AddressStore> AddressResolver<A> {
    pub fn new(store: A) -> Self {
        Self { store }
    }

    /// Resolves a selector for one purpose.
    ///
    /// Inline addresses must have every required field. Saved ids must belong
    /// to the user. `Default` takes the user's default able to serve the
    /// purpose. Anything else is `MissingAddress`.
    pub async fn resolve(
        &self,
        user_id: UserId,
        purpose: AddressPurpose,
        selector: &AddressSelector,
    ) -> Result<ResolvedAddress> {
        let missing = || CheckoutError::MissingAddress { kind: purpose };

        match selector {
            AddressSelector::Inline { address, save } => {
                address.validate().map_err(|e| {
                    tracing::debug!(%purpose, error = %e, "inline address rejected");
                    missing()
                })?;
                Ok(ResolvedAddress {
                    formatted: address.formatted(),
                    save: save.then(|| address.clone()),
                })
            }
            AddressSelector::Saved { id } => {
                let address = self
                    .store
                    .find_by_id(*id)
                    .await?
                    .filter(|a| a.user_id == user_id)
                    .ok_or_else(missing)?;
                Ok(ResolvedAddress {
                    formatted: address.postal.formatted(),
                    save: None,
                })
            }
            AddressSelector::Default => {
                let address = self
                    .store
                    .find_default(user_id, purpose)
                    .await?
                    .ok_or_else(missing)?;
                Ok(ResolvedAddress {
                    formatted: address.postal.formatted(),
                    save: None,
                })
            }
        }
    }

    /// Adds an inline address to the user's address book unless an
    /// equivalent one is already there. Returns true if a row was written.
    pub async fn remember(
        &self,
        user_id: UserId,
        purpose: AddressPurpose,
        postal: PostalAddress,
    ) -> std::result::Result<bool, StoreError> {
        let existing = self.store.list_for_user(user_id).await?;
        if existing.iter().any(|a| a.postal.same_as(&postal)) {
            return Ok(false);
        }

        self.store
            .save(NewAddress {
                user_id,
                postal,
                address_type: purpose.address_type(),
                is_default: false,
            })
            .await?;
        Ok(true)
    }
}
