//! Entities the core reads from external collaborators but never owns.
//! `Profile` is immutable from the core's perspective; writes happen in
//! the external profile service.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::redact::mask_card;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Card {
    pub number: String,
    pub holder: String,
    pub expiry_month: String,
    pub expiry_year_full: String,
    pub cvv: String,
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("number", &mask_card(&self.number))
            .field("holder", &self.holder)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year_full", &self.expiry_year_full)
            .field("cvv", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub shipping: Address,
    pub billing: Address,
    pub billing_same_as_shipping: bool,
    pub card: Card,
}
