#![cfg(unix)]
#![allow(clippy::needless_pass_by_value)]

mod scenario;
mod tests;
mod transport;
