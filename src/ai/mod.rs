mod client;
pub mod inference;
pub mod quota;

pub use client::ClassifierClient;
pub use quota::MonthlyQuota;

#[cfg(test)]
pub(crate) use client::tests::client_for;
