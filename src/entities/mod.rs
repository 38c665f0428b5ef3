//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod balance;
pub mod proof;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use balance::{Column as BalanceColumn, Entity as Balance, Model as BalanceModel};
pub use proof::{Column as ProofColumn, Entity as Proof, Model as ProofModel, ProofStatus};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
