pub mod conversations;
pub mod convert;
pub mod coordinates;
pub mod donations;
pub mod error;
pub mod middleware;
pub mod needs;
pub mod ongs;
pub mod routes;
pub mod shipping;
pub mod state;
pub mod validation;

#[cfg(test)]
mod test_support;
