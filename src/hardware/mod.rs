pub mod temperature_controller;

pub use temperature_controller::TemperatureController;
