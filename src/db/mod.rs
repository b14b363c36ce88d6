//! Database session layer.
//!
//! The lock coordinator talks to the backend through the [`Session`] trait.
//! Every statement travels as a [`Query`]: a [`Statement`] tag naming which
//! contract it fulfils, the SQL text, and its bound parameters. Rows come back
//! as named columns of [`Value`]s.
//!
//! [`PgSession`] is the production implementation on top of sqlx.

mod postgres;
mod query;
mod session;

pub use postgres::PgSession;
pub use query::{Query, Row, Statement, Value};
pub use session::Session;
