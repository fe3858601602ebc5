// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// All Order-specific code:
// - Value objects (OrderId, OrderStatus)
// - Events (OrderPlaced)
// - Commands (PlaceOrderCommand)
// - Errors (OrderError)
// - Aggregate (Order with its lifecycle rules)
// - Command Handler (OrderCommandHandler) and post-commit listeners
//
// The outbox machinery underneath is aggregate-agnostic and lives in
// `crate::outbox`.
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;
pub mod listeners;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
pub use listeners::*;
