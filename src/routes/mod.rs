/// Router Module Index
///
/// Every route sits behind the `AuthenticateUser` stage applied in `create_router`.
/// The split below only says which routes that stage lets through anonymously.

/// The login page and login submission. The authentication stage exempts `/login`.
pub mod public;

/// Routes that need a logged-in session.
pub mod authenticated;

/// Seller resources, additionally guarded by `SellerHasAccess`.
pub mod seller;
