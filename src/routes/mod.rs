/// Router Module Index
///
/// Routes are split by the access level they require. Authentication is applied
/// as a layer per module in `create_router`; role checks happen in the handlers.

/// Routes open to everyone (menu, table lookup, placing an order).
pub mod public;

/// Routes that need a resolved `AuthUser`.
pub mod authenticated;

/// Routes restricted to the 'staff' and 'admin' roles.
pub mod staff;
