//! Accountant configuration types.

use privcal_core::{DpError, Result};

use crate::accountant::{default_orders, has_valid_orders, CompositionAccountant};

/// Configuration for constructing a privacy accountant with a fresh state.
pub trait AccountantConfig {
    /// Accountant type created by this config.
    type Accountant;

    /// Create a new accountant instance.
    fn create_accountant(&self) -> Result<Self::Accountant>;
}

/// Configuration for the RDP composition accountant.
#[derive(Clone, Debug, PartialEq)]
pub struct RdpAccountantConfig {
    /// Rényi orders to evaluate.
    pub orders: Vec<f64>,
}

impl Default for RdpAccountantConfig {
    fn default() -> Self {
        Self {
            orders: default_orders(),
        }
    }
}

impl RdpAccountantConfig {
    /// Create a config with explicit orders.
    pub fn new(orders: Vec<f64>) -> Self {
        Self { orders }
    }

    /// Check that at least one usable order remains after filtering.
    pub fn validate(&self) -> Result<()> {
        if !has_valid_orders(&self.orders) {
            return Err(DpError::config(
                "accountant needs at least one finite Rényi order above one",
            ));
        }
        Ok(())
    }
}

impl AccountantConfig for RdpAccountantConfig {
    type Accountant = CompositionAccountant;

    fn create_accountant(&self) -> Result<Self::Accountant> {
        self.validate()?;
        Ok(CompositionAccountant::with_orders(self.orders.clone()))
    }
}
