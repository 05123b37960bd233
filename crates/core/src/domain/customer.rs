use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, ValidationError};

pub const PHONE_DIGITS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Accepts exactly ten ASCII decimal digits, nothing else.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let candidate = input.trim();
        let valid =
            candidate.len() == PHONE_DIGITS && candidate.bytes().all(|byte| byte.is_ascii_digit());
        if !valid {
            return Err(ValidationError::MalformedPhone { input: candidate.to_owned() });
        }
        Ok(Self(candidate.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerField {
    Name,
    Address,
    Phone,
}

impl CustomerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Address => "address",
            Self::Phone => "phone",
        }
    }
}

/// Customer data as it is being collected. Each field can be set once per session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    name: Option<String>,
    address: Option<String>,
    phone: Option<PhoneNumber>,
}

impl CustomerProfile {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn phone(&self) -> Option<&PhoneNumber> {
        self.phone.as_ref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), DomainError> {
        set_once(&mut self.name, name.into(), CustomerField::Name)
    }

    pub fn set_address(&mut self, address: impl Into<String>) -> Result<(), DomainError> {
        set_once(&mut self.address, address.into(), CustomerField::Address)
    }

    pub fn set_phone(&mut self, phone: PhoneNumber) -> Result<(), DomainError> {
        set_once(&mut self.phone, phone, CustomerField::Phone)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.phone.is_none()
    }

    pub fn complete(&self) -> Result<Customer, DomainError> {
        let missing = |field: CustomerField| DomainError::IncompleteCustomer { missing: field };
        Ok(Customer {
            name: self.name.clone().ok_or_else(|| missing(CustomerField::Name))?,
            address: self.address.clone().ok_or_else(|| missing(CustomerField::Address))?,
            phone: self.phone.clone().ok_or_else(|| missing(CustomerField::Phone))?,
        })
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: CustomerField) -> Result<(), DomainError> {
    if slot.is_some() {
        return Err(DomainError::CustomerFieldAlreadySet { field });
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub address: String,
    pub phone: PhoneNumber,
}
