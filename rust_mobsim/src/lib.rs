pub mod simulation;

#[cfg(feature = "test_util")]
pub mod test_utils;
