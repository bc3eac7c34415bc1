pub mod clock;
pub mod io_driver;
pub mod register;
