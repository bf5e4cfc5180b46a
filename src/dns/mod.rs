pub mod executor;
pub mod pacing;
pub mod resolve;
pub mod resolvers;
pub mod runner;

#[cfg(test)]
mod testing;
