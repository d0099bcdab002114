pub mod checkout;
pub mod convert;
pub mod payment;
