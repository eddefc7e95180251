pub mod graph;
pub mod least_cost_path;
pub mod travel_time_collector;
