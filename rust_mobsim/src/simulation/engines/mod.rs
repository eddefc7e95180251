pub mod activity_engine;
pub mod leg_engine;
pub mod network_engine;
pub mod teleportation_engine;
